//! # Notifier Testing Utils
//!
//! Shared testing utilities for the notification dispatch system.
//!
//! ## Features
//!
//! - **Mock Repositories**: In-memory `RecipientRepository` with write-failure injection
//! - **Mock Channel Sender**: Scripted failures, call log, and concurrency tracking
//! - **Test Data Builders**: Utilities for creating test recipients
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! notifier-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

// Re-export commonly used items
pub use builders::*;
pub use mocks::*;
