//! Launching AI coding tools.
//!
//! Every launch goes through [`ToolInvoker`], which gates the command line on
//! the validator and spawns the program directly.

mod invoke;

pub use invoke::{InvokeError, ToolInvoker, ToolOutput};
