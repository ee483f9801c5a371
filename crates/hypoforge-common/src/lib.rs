//! hypoforge-common: Shared error type, HTTP client and retry policy used across all Hypoforge crates.

pub mod error;
pub mod retry;
pub mod sandbox;

pub use error::{HypoforgeError, Result};
pub use retry::RetryPolicy;
pub use sandbox::SandboxClient;
