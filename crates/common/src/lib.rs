//! Shared types for the crease workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::{Secret, SecretString};
