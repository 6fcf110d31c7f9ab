//! Ballpark Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the ballpark workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Common error type and result alias
//! - **Types**: Cell values and store timestamps shared by readers and writers
//! - **Logging**: Tracing subscriber bootstrap driven by environment variables
//!
//! # Example
//!
//! ```no_run
//! use ballpark_common::logging::{init_logging, LogConfig};
//! use ballpark_common::types::Value;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let score = Value::Integer(3);
//!     tracing::info!(%score, "Parsed score");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{Timestamp, Value};
