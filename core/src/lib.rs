//! clstamp Core Library
//! Session credentials, webhook request forwarding and error translation for
//! the storage and stamping API.

pub mod config;
pub mod models;
pub mod proxy;
