//! Command validation before process spawning.
//!
//! A command is accepted only if it passes two independent checks:
//!
//! 1. A scan of the whole raw string for shell metacharacters and injection
//!    idioms (chaining, substitution, redirection, NUL bytes). This runs on
//!    the original input, before tokenization, so nothing can hide between
//!    or inside tokens.
//! 2. An allow-list on every parsed token: ASCII letters, digits, `.`, `_`,
//!    `-` and `/`.
//!
//! Rejected commands are reported as data in [`ValidationResult`]; nothing
//! here returns `Err` for bad input.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::lexer::parse_command;

/// Characters a shell would interpret. Any occurrence rejects the command.
const SHELL_METACHARACTERS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']', '<', '>', '\\', '!', '#', '*', '?',
    '"', '\'', '\0',
];

/// Injection idioms, checked first so the rejection names the construct.
const INJECTION_PATTERNS: &[(&str, &str)] = &[
    (r"\x00", "NUL byte"),
    (r"&&|\|\|", "command chaining"),
    (r";", "command separator"),
    (r"`", "backtick command substitution"),
    (r"\$\(", "command substitution"),
    (r"\$\{?[A-Za-z_]", "variable expansion"),
    (r">>", "output redirection (append)"),
    (r">", "output redirection"),
    (r"<", "input redirection"),
    (r"\|", "pipe"),
];

fn injection_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        INJECTION_PATTERNS
            .iter()
            .filter_map(|(pattern, label)| match Regex::new(pattern) {
                Ok(re) => Some((re, *label)),
                Err(e) => {
                    // The metacharacter scan below still covers this case.
                    tracing::error!("Invalid injection pattern {}: {}", pattern, e);
                    None
                }
            })
            .collect()
    })
}

/// Why a command was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Rejection {
    #[error("Command is empty")]
    Empty,

    #[error("Command contains invalid characters ({0})")]
    InvalidCharacters(String),

    #[error("Invalid command name: {0}")]
    InvalidProgram(String),

    #[error("Invalid argument at position {index}: {value}")]
    InvalidArgument { index: usize, value: String },
}

/// Outcome of validating a command line.
///
/// On failure `command` and `args` still hold whatever was parsed, for
/// diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub command: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Rejection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn rejected(error: Rejection, command: String, args: Vec<String>) -> Self {
        Self {
            is_valid: false,
            command,
            args,
            error: Some(error),
            warnings: Vec::new(),
        }
    }
}

/// A program and argument list that passed validation.
///
/// Only obtainable through [`make_safe`] or [`SafeCommand::from_parts`], so
/// holding one is proof the command was checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeCommand {
    program: String,
    args: Vec<String>,
}

impl SafeCommand {
    /// Validate a pre-split program and argument list.
    pub fn from_parts(program: &str, args: &[String]) -> Result<Self, Rejection> {
        let result = validate_parts(program, args);
        match result.error {
            None => Ok(Self {
                program: result.command,
                args: result.args,
            }),
            Some(rejection) => Err(rejection),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Find the first dangerous construct in `input`, if any.
pub fn find_dangerous_pattern(input: &str) -> Option<String> {
    for (re, label) in injection_patterns() {
        if re.is_match(input) {
            return Some((*label).to_string());
        }
    }
    input
        .chars()
        .find(|c| SHELL_METACHARACTERS.contains(c))
        .map(|c| format!("shell metacharacter {:?}", c))
}

/// True if `token` contains only ASCII letters, digits, `.`, `_`, `-` or `/`.
pub fn is_safe_token(token: &str) -> bool {
    token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
}

/// Validate a raw command line.
pub fn validate(input: &str) -> ValidationResult {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return ValidationResult::rejected(Rejection::Empty, String::new(), Vec::new());
    }

    let parsed = parse_command(trimmed);

    if let Some(reason) = find_dangerous_pattern(input) {
        return ValidationResult::rejected(
            Rejection::InvalidCharacters(reason),
            parsed.program,
            parsed.args,
        );
    }

    check_tokens(parsed.program, parsed.args)
}

/// Validate input that may be absent. `None` is treated as an empty command.
pub fn validate_optional(input: Option<&str>) -> ValidationResult {
    validate(input.unwrap_or_default())
}

/// Validate a program and argument list that were never a single string.
///
/// Every part gets the same dangerous-pattern scan a raw command line gets.
pub fn validate_parts(program: &str, args: &[String]) -> ValidationResult {
    if program.trim().is_empty() {
        return ValidationResult::rejected(Rejection::Empty, String::new(), args.to_vec());
    }

    for part in std::iter::once(program).chain(args.iter().map(String::as_str)) {
        if let Some(reason) = find_dangerous_pattern(part) {
            return ValidationResult::rejected(
                Rejection::InvalidCharacters(reason),
                program.to_string(),
                args.to_vec(),
            );
        }
    }

    check_tokens(program.to_string(), args.to_vec())
}

fn check_tokens(program: String, args: Vec<String>) -> ValidationResult {
    if program.is_empty() || !is_safe_token(&program) {
        return ValidationResult::rejected(
            Rejection::InvalidProgram(program.clone()),
            program,
            args,
        );
    }

    let mut warnings = Vec::new();
    for (index, arg) in args.iter().enumerate() {
        if arg.is_empty() {
            warnings.push(format!("Argument at position {} is empty", index));
            continue;
        }
        if !is_safe_token(arg) {
            let value = arg.clone();
            return ValidationResult::rejected(
                Rejection::InvalidArgument { index, value },
                program,
                args,
            );
        }
    }

    ValidationResult {
        is_valid: true,
        command: program,
        args,
        error: None,
        warnings,
    }
}

/// Gate to call immediately before spawning. `None` means do not execute.
pub fn make_safe(input: &str) -> Option<SafeCommand> {
    let result = validate(input);
    if !result.is_valid {
        tracing::warn!(
            "Refusing to run command: {}",
            result
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default()
        );
        return None;
    }
    Some(SafeCommand {
        program: result.command,
        args: result.args,
    })
}
