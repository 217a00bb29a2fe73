//! Environment variable naming and application.
//!
//! The variable name for a credential is `CPA_<PLATFORM>_<TOOL>_<KEY>`,
//! uppercased with hyphens replaced by underscores. Consumers of exported
//! credentials depend on this exact transform.
//!
//! Exporting into the process environment only reaches this process and its
//! children, and removing a credential later does not unset a variable that
//! was already exported. Callers that
//! spawn children can use [`EnvMode::Deferred`] and pass the name/value pairs
//! to the child explicitly instead.

use super::StoreError;

/// Prefix of every exported credential variable.
pub const ENV_PREFIX: &str = "CPA";

/// Whether `env` credentials are written into this process's environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvMode {
    /// Export into the ambient process environment.
    #[default]
    Process,
    /// Never touch the ambient environment; hand pairs back to the caller.
    Deferred,
}

/// Characters cmd.exe would interpret inside `set "NAME=value"`.
const CMD_UNSAFE_CHARS: &[char] = &['"', '%', '!', '\r', '\n'];

/// Shell dialect for printed assignments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShellFlavor {
    #[default]
    Posix,
    Cmd,
}

/// Build the environment variable name for a credential.
pub fn env_var_name(platform_id: &str, tool_id: &str, key: &str) -> String {
    format!("{}_{}_{}_{}", ENV_PREFIX, platform_id, tool_id, key)
        .to_uppercase()
        .replace('-', "_")
}

/// Set one credential variable in the current process.
pub fn apply_env_credential(name: &str, value: &str) -> Result<(), StoreError> {
    if name.is_empty() || name.contains('=') || name.contains('\0') {
        return Err(StoreError::InvalidValue(
            name.to_string(),
            "environment variable names cannot be empty or contain '=' or NUL",
        ));
    }
    if value.contains('\0') {
        return Err(StoreError::InvalidValue(
            name.to_string(),
            "environment variable values cannot contain NUL",
        ));
    }
    std::env::set_var(name, value);
    tracing::debug!("Exported {}", name);
    Ok(())
}

/// Render assignments a shell can evaluate.
///
/// Names that are not valid shell identifiers are skipped with a warning, as
/// are cmd values containing quotes, `%`, `!` or line breaks.
pub fn format_assignments(pairs: &[(String, String)], flavor: ShellFlavor) -> String {
    let mut out = String::new();
    for (name, value) in pairs {
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            tracing::warn!("Skipping {}: not a valid shell variable name", name);
            continue;
        }
        match flavor {
            ShellFlavor::Posix => {
                out.push_str(&format!("export {}={}\n", name, crate::util::shell_quote(value)));
            }
            ShellFlavor::Cmd => {
                if value.contains(CMD_UNSAFE_CHARS) {
                    tracing::warn!(
                        "Skipping {}: value cannot be represented safely in a cmd assignment",
                        name
                    );
                    continue;
                }
                out.push_str(&format!("set \"{}={}\"\r\n", name, value));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_name_follows_contract() {
        assert_eq!(env_var_name("glm", "cursor", "api_key"), "CPA_GLM_CURSOR_API_KEY");
        assert_eq!(
            env_var_name("z-ai", "claude-code", "base-url"),
            "CPA_Z_AI_CLAUDE_CODE_BASE_URL"
        );
        // Only hyphens are rewritten.
        assert_eq!(env_var_name("kimi", "tool.v2", "k"), "CPA_KIMI_TOOL.V2_K");
    }

    #[test]
    fn test_apply_rejects_unrepresentable_pairs() {
        assert!(apply_env_credential("A=B", "v").is_err());
        assert!(apply_env_credential("CPA_ENV_TEST_NUL", "a\0b").is_err());
        assert!(std::env::var("CPA_ENV_TEST_NUL").is_err());

        apply_env_credential("CPA_ENV_TEST_APPLY", "value").unwrap();
        assert_eq!(std::env::var("CPA_ENV_TEST_APPLY").unwrap(), "value");
    }

    #[test]
    fn test_format_assignments_quotes_for_posix() {
        let pairs = vec![("CPA_A_B_C".to_string(), "it's".to_string())];
        assert_eq!(
            format_assignments(&pairs, ShellFlavor::Posix),
            "export CPA_A_B_C='it'\\''s'\n"
        );
        assert_eq!(
            format_assignments(&pairs, ShellFlavor::Cmd),
            "set \"CPA_A_B_C=it's\"\r\n"
        );
    }

    #[test]
    fn test_format_assignments_skips_invalid_names() {
        let pairs = vec![
            ("CPA_KIMI_TOOL.V2_K".to_string(), "x".to_string()),
            ("CPA_KIMI_TOOL_K".to_string(), "y".to_string()),
        ];
        assert_eq!(
            format_assignments(&pairs, ShellFlavor::Posix),
            "export CPA_KIMI_TOOL_K='y'\n"
        );
    }

    #[test]
    fn test_format_assignments_skips_unsafe_cmd_values() {
        let pairs = vec![
            ("CPA_A_B_C".to_string(), "x\"&calc&\"".to_string()),
            ("CPA_A_B_PCT".to_string(), "%PATH%".to_string()),
            ("CPA_A_B_BANG".to_string(), "a!b!".to_string()),
            ("CPA_A_B_NL".to_string(), "a\r\nset X=1".to_string()),
            ("CPA_A_B_OK".to_string(), "sk-plain&ok".to_string()),
        ];
        assert_eq!(
            format_assignments(&pairs, ShellFlavor::Cmd),
            "set \"CPA_A_B_OK=sk-plain&ok\"\r\n"
        );
        // Posix quoting handles the same values.
        assert!(format_assignments(&pairs, ShellFlavor::Posix)
            .contains("export CPA_A_B_C='x\"&calc&\"'\n"));
    }
}
