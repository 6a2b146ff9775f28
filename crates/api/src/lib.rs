//! HTTP API: configuration, routing, and the demo resources behind it.

pub mod app;
pub mod config;
pub mod svg;
pub mod users;
