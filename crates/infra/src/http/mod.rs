//! HTTP transport shared by the downstream clients

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
