//! Command parsing and validation for external tool invocation.
//!
//! Nothing in this crate passes a raw command string to a shell. Callers go
//! through [`make_safe`] (or [`SafeCommand::from_parts`]) and hand the
//! resulting program and argument list to a non-shell spawn, see
//! [`crate::tools::ToolInvoker`].
//!
//! ```
//! use cpa::command::{make_safe, validate, Rejection};
//!
//! let safe = make_safe("npm install -g package-name").unwrap();
//! assert_eq!(safe.program(), "npm");
//!
//! let result = validate("ls; rm -rf /");
//! assert!(matches!(result.error, Some(Rejection::InvalidCharacters(_))));
//! ```

mod lexer;
mod validator;

pub use lexer::{parse_command, tokenize, ParsedCommand};
pub use validator::{
    find_dangerous_pattern, is_safe_token, make_safe, validate, validate_optional,
    validate_parts, Rejection, SafeCommand, ValidationResult,
};
