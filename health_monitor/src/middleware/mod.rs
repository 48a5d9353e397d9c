//! Middleware for services exposing a health endpoint

pub mod logging;

pub use logging::with_request_logging;
