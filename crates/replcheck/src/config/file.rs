//! File-based configuration loading.

use std::path::Path;

use serde::de::DeserializeOwned;

use super::HarnessConfig;
use crate::error::{ExpectError, Result};

/// Parse TOML `content`, naming `origin` in any error.
pub fn parse_toml<T: DeserializeOwned>(content: &str, origin: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| ExpectError::config(format!("{origin}: {e}")))
}

/// Read and parse a TOML file.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ExpectError::config(format!("cannot read {}: {e}", path.display()))
    })?;
    parse_toml(&content, &path.display().to_string())
}

/// Load a harness configuration file.
///
/// Keys missing from the file keep their built-in defaults.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    let config: HarnessConfig = load_toml(path)?;
    tracing::debug!(path = %path.display(), "loaded configuration file");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::expect::PatternSpec;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: HarnessConfig = parse_toml(
            r#"
            [session]
            program = "/bin/sh"
            args = ["-i"]
            env = { PS1 = "rshell> " }

            [timeouts]
            step_ms = 1500
            "#,
            "inline",
        )
        .unwrap();

        assert_eq!(config.session.program, "/bin/sh");
        assert_eq!(config.session.args, vec!["-i"]);
        assert_eq!(config.timeouts.step, Duration::from_millis(1500));
        assert_eq!(config.timeouts.resync, Duration::from_secs(2));
        assert_eq!(config.markers.prompt, PatternSpec::literal("rshell>"));
    }

    #[test]
    fn markers_accept_regex_tables() {
        let config: HarnessConfig = parse_toml(
            r#"
            [markers]
            prompt = { regex = "\\w+> " }

            [session.shutdown]
            quit_command = "exit"
            grace_ms = 500
            "#,
            "inline",
        )
        .unwrap();

        assert_eq!(config.markers.prompt, PatternSpec::regex(r"\w+> "));
        assert_eq!(config.session.shutdown.quit_command, "exit");
        assert_eq!(config.session.shutdown.grace, Duration::from_millis(500));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse_toml::<HarnessConfig>("[session]\nprogramme = \"sh\"\n", "bad.toml")
            .unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_config(Path::new("/nonexistent/replcheck.toml")).unwrap_err();
        assert!(matches!(err, ExpectError::Config { .. }));
    }
}
