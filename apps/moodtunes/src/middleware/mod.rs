//! HTTP middleware for the moodtunes server.

pub mod errors;

pub use errors::expose_error_details;
