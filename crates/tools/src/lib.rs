//! The `Tool` trait the turn-execution core dispatches against, plus a
//! couple of illustrative tools used by tests.
//!
//! Concrete tools (shell exec, filesystem access, process management) are
//! host-supplied and out of scope here; this crate defines the seam and
//! demonstrates it with tools simple enough to be deterministic in tests.

pub mod demo;
pub mod raw_result;
pub mod tool;

pub use raw_result::{RawToolError, RawToolResult};
pub use tool::{Tool, ToolContext};
