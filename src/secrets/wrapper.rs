//! Wrapper scripts for the `wrapper` storage type.
//!
//! A wrapper never contains secret material. It calls back into the CLI to
//! print the credentials for its `(platform, tool)` pair from the encrypted
//! store, evaluates them, and then runs the tool:
//!
//! ```text
//! <wrapper_dir>/<platform>/<tool>.sh    (Unix, mode 0755)
//! <wrapper_dir>/<platform>/<tool>.bat   (Windows)
//! ```

use std::path::{Path, PathBuf};

use crate::command::is_safe_token;

use super::StoreError;

/// Generates and removes wrapper scripts under one directory.
#[derive(Debug, Clone)]
pub struct WrapperScripts {
    dir: PathBuf,
    cli_program: String,
}

impl WrapperScripts {
    pub fn new(dir: impl Into<PathBuf>, cli_program: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            cli_program: cli_program.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Both script paths for a pair: `(posix, cmd)`.
    pub fn script_paths(&self, platform_id: &str, tool_id: &str) -> (PathBuf, PathBuf) {
        let base = self.dir.join(platform_id);
        (
            base.join(format!("{}.sh", tool_id)),
            base.join(format!("{}.bat", tool_id)),
        )
    }

    /// Check that a pair can be embedded in a script and used as a path.
    pub fn check_identifiers(&self, platform_id: &str, tool_id: &str) -> Result<(), StoreError> {
        for id in [platform_id, tool_id] {
            if id.is_empty() || !is_safe_token(id) || id.contains('/') || id.starts_with('.') {
                return Err(StoreError::InvalidIdentifier(
                    id.to_string(),
                    "wrapper identifiers may only use letters, digits, '.', '_' and '-'",
                ));
            }
        }
        if !is_safe_token(&self.cli_program) || self.cli_program.is_empty() {
            return Err(StoreError::InvalidIdentifier(
                self.cli_program.clone(),
                "wrapper CLI program is not a safe command name",
            ));
        }
        Ok(())
    }

    /// Write the wrapper for this platform's native shell. Returns its path.
    pub fn write(&self, platform_id: &str, tool_id: &str) -> Result<PathBuf, StoreError> {
        self.check_identifiers(platform_id, tool_id)?;
        let (posix, cmd) = self.script_paths(platform_id, tool_id);

        let (path, contents) = if cfg!(windows) {
            (cmd, self.render_cmd(platform_id, tool_id))
        } else {
            (posix, self.render_posix(platform_id, tool_id))
        };

        crate::util::write_atomic(&path, contents.as_bytes(), false).map_err(|source| {
            StoreError::Io {
                path: path.display().to_string(),
                source,
            }
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).map_err(
                |source| StoreError::Io {
                    path: path.display().to_string(),
                    source,
                },
            )?;
        }

        tracing::info!("Wrote wrapper script {}", path.display());
        Ok(path)
    }

    /// Delete both scripts for a pair. Missing files are not an error.
    pub fn remove(&self, platform_id: &str, tool_id: &str) -> std::io::Result<()> {
        let (posix, cmd) = self.script_paths(platform_id, tool_id);
        for path in [posix, cmd] {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::info!("Removed wrapper script {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn render_posix(&self, platform_id: &str, tool_id: &str) -> String {
        format!(
            "#!/bin/sh\n\
             # Wrapper for '{tool}' using '{platform}' credentials.\n\
             # Generated by cpa. No credentials are stored in this file; they are\n\
             # read from the encrypted credential store each time it runs.\n\
             credentials=$({cli} credential env --platform {platform} --tool {tool}) || exit 1\n\
             eval \"$credentials\"\n\
             exec {tool} \"$@\"\n",
            cli = self.cli_program,
            platform = platform_id,
            tool = tool_id,
        )
    }

    fn render_cmd(&self, platform_id: &str, tool_id: &str) -> String {
        format!(
            "@echo off\r\n\
             rem Wrapper for '{tool}' using '{platform}' credentials.\r\n\
             rem Generated by cpa. No credentials are stored in this file.\r\n\
             for /f \"usebackq delims=\" %%L in (`{cli} credential env --platform {platform} --tool {tool} --shell cmd`) do %%L\r\n\
             {tool} %*\r\n",
            cli = self.cli_program,
            platform = platform_id,
            tool = tool_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_script_calls_back_into_store() {
        let scripts = WrapperScripts::new("/tmp/unused", "cpa");
        let script = scripts.render_posix("glm", "claude-code");

        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("$(cpa credential env --platform glm --tool claude-code)"));
        assert!(script.contains("exec claude-code \"$@\""));
    }

    #[test]
    fn test_cmd_script_uses_cmd_assignments() {
        let scripts = WrapperScripts::new("/tmp/unused", "cpa");
        let script = scripts.render_cmd("glm", "cursor");
        assert!(script.contains("--shell cmd"));
        assert!(script.ends_with("cursor %*\r\n"));
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        let scripts = WrapperScripts::new("/tmp/unused", "cpa");
        assert!(scripts.check_identifiers("glm", "cursor").is_ok());
        assert!(scripts.check_identifiers("glm", "cur sor").is_err());
        assert!(scripts.check_identifiers("../etc", "x").is_err());
        assert!(scripts.check_identifiers("glm", "a/b").is_err());
        assert!(scripts.check_identifiers("glm", "$(id)").is_err());

        let bad_cli = WrapperScripts::new("/tmp/unused", "cpa; id");
        assert!(bad_cli.check_identifiers("glm", "cursor").is_err());
    }

    #[test]
    fn test_write_and_remove() {
        let temp = tempfile::tempdir().unwrap();
        let scripts = WrapperScripts::new(temp.path().join("wrappers"), "cpa");

        let path = scripts.write("glm", "cursor").unwrap();
        assert!(path.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        scripts.remove("glm", "cursor").unwrap();
        assert!(!path.exists());
        // Removing again is fine.
        scripts.remove("glm", "cursor").unwrap();
    }
}
