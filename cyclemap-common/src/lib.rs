//! Common types for the cyclemap toolkit

pub mod error;

pub use error::{Error, GeometryError, Result};
