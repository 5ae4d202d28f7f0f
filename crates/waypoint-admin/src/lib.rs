//! Management-plane operations over rules, 404 records and settings.
//!
//! Every rule write goes through validation first and invalidates the rule
//! cache before it returns, so the next request sees the change.

pub mod error;
pub mod report;
pub mod service;

pub use error::{AdminError, Result};
pub use report::Report;
pub use service::{Conversion, RuleAdmin};
