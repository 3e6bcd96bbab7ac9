//! Push job ports and service

pub mod ports;
pub mod service;

pub use service::{PushJobService, PushPorts};
