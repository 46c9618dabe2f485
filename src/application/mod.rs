//! Application services layer scaffolding.

pub mod cache;
pub mod channels;
pub mod error;
pub mod jobs;
pub mod rankings;
pub mod repos;
pub mod source;
pub mod trending;
