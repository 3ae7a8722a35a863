pub mod client;
pub mod commands;

pub use client::{UpstreamClient, UpstreamError, UpstreamResponse};
