pub mod generate_secret;
pub mod start;
pub mod status;
pub mod upload;
