//! K8s Pulse server: HTTP surface and configuration for the metrics service

pub mod api;
pub mod config;
