use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compiler::package::PHASE_FUNCTIONS;
use crate::compiler::variables::OPERATORS;

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {e}"),
            ConfigError::Json(e) => write!(f, "JSON error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

// ── Compiler config ──────────────────────────────────────────────

/// Settings for one compilation, stored as JSON. Missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Prefix of every `function <namespace>:<path>` call.
    pub namespace: String,
    /// Path of the root function.
    pub entry: String,
    /// Objective holding every int and bool register.
    pub register_objective: String,
    pub statement_separator: char,
    /// Prefix of compiler-generated names. Users cannot declare names with it.
    pub anonymous_prefix: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            namespace: "mcs".to_string(),
            entry: "main".to_string(),
            register_objective: "mcs.vars".to_string(),
            statement_separator: ';',
            anonymous_prefix: "anon_".to_string(),
        }
    }
}

impl CompilerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`CompilerConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let is_path_segment = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'))
        };
        if !is_path_segment(&self.namespace) {
            return Err(ConfigError::Invalid(format!("bad namespace '{}'", self.namespace)));
        }
        if !is_path_segment(&self.entry) || PHASE_FUNCTIONS.contains(&self.entry.as_str()) {
            return Err(ConfigError::Invalid(format!("bad entry function '{}'", self.entry)));
        }
        if self.register_objective.is_empty()
            || self.register_objective.len() > 16
            || self.register_objective.chars().any(char::is_whitespace)
        {
            return Err(ConfigError::Invalid(format!(
                "bad register objective '{}'",
                self.register_objective
            )));
        }
        let sep = self.statement_separator;
        // Operator characters would split `||` or `==` into statements.
        let in_operator = OPERATORS.iter().any(|(symbol, _)| symbol.contains(sep));
        if in_operator
            || sep.is_alphanumeric()
            || sep.is_whitespace()
            || matches!(sep, '(' | ')' | '{' | '}' | '[' | ']' | ',' | '"' | '_')
        {
            return Err(ConfigError::Invalid(format!("bad statement separator '{sep}'")));
        }
        if self.anonymous_prefix.is_empty()
            || !self.anonymous_prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "bad anonymous prefix '{}'",
                self.anonymous_prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("mcs-config-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: CompilerConfig = serde_json::from_str(r#"{ "namespace": "game" }"#).unwrap();
        assert_eq!(config.namespace, "game");
        assert_eq!(config.entry, "main");
        assert_eq!(config.statement_separator, ';');
    }

    #[test]
    fn save_then_load() {
        let path = temp_path("roundtrip");
        let config = CompilerConfig {
            entry: "start".into(),
            ..CompilerConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(CompilerConfig::load(&path).unwrap(), config);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = CompilerConfig::load_or_default(&temp_path("absent")).unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn rejects_unusable_values() {
        for config in [
            CompilerConfig { namespace: "My NS".into(), ..CompilerConfig::default() },
            CompilerConfig { entry: "load".into(), ..CompilerConfig::default() },
            CompilerConfig { statement_separator: '{', ..CompilerConfig::default() },
            CompilerConfig { anonymous_prefix: String::new(), ..CompilerConfig::default() },
        ] {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "{config:?}");
        }
    }

    #[test]
    fn separator_cannot_be_part_of_an_operator() {
        for sep in ['|', '&', '=', '-', '!', '<', '/', '.'] {
            let config = CompilerConfig { statement_separator: sep, ..CompilerConfig::default() };
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "{sep:?}");
        }
        for sep in [';', '#', '$'] {
            let config = CompilerConfig { statement_separator: sep, ..CompilerConfig::default() };
            assert!(config.validate().is_ok(), "{sep:?}");
        }
    }
}
