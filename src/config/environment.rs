//! Deployment environment, which picks the `config/{env}.toml` layer

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Staging,
    Production,
}

impl Environment {
    /// Variable consulted when `--env` is not given
    pub const ENV_VAR: &'static str = "MAILSCHED_APP_ENV";

    pub const ALL: [Environment; 4] = [
        Environment::Development,
        Environment::Test,
        Environment::Staging,
        Environment::Production,
    ];

    /// Environment named by `MAILSCHED_APP_ENV`.
    ///
    /// Unset or unrecognised values select development; logging is not up
    /// yet at this point, so nothing is reported.
    pub fn from_env() -> Self {
        std::env::var(Self::ENV_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// File stem of the environment layer
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Environment::Development => &["development", "dev"],
            Environment::Test => &["test"],
            Environment::Staging => &["staging", "stage"],
            Environment::Production => &["production", "prod"],
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|env| env.aliases().contains(&wanted.as_str()))
            .ok_or_else(|| ConfigError::UnknownEnvironment(s.to_string()))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
