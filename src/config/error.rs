//! Errors raised while loading or checking settings

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Settings table a rejected key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Database,
    Smtp,
    Scheduler,
    Logger,
    /// Keys that only exist on the command line, e.g. `config_file`
    CommandLine,
}

impl Section {
    /// Section owning a dotted key such as `smtp.port`
    pub fn of(field: &str) -> Self {
        let head = field.split_once('.').map_or(field, |(head, _)| head);
        match head {
            "database" => Section::Database,
            "smtp" => Section::Smtp,
            "scheduler" => Section::Scheduler,
            "logger" => Section::Logger,
            _ => Section::CommandLine,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Database => "database",
            Section::Smtp => "smtp",
            Section::Scheduler => "scheduler",
            Section::Logger => "logger",
            Section::CommandLine => "command line",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required configuration file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// The sources merged but do not fit the `Settings` shape
    #[error("cannot deserialize configuration: {0}")]
    Malformed(String),

    #[error("invalid {section} setting `{field}`: {message}")]
    Invalid {
        section: Section,
        field: String,
        message: String,
    },

    /// Two sources that select the configuration location were both given
    #[error("conflicting configuration sources: {0}")]
    ConflictingSources(String),

    #[error("unknown environment '{0}', expected development, test, staging or production")]
    UnknownEnvironment(String),

    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

impl ConfigError {
    /// Rejects the dotted key `field`; the section is taken from its prefix
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        ConfigError::Invalid {
            section: Section::of(&field),
            field,
            message: message.into(),
        }
    }

    /// Dotted key of an `Invalid` error
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn section(&self) -> Option<Section> {
        match self {
            ConfigError::Invalid { section, .. } => Some(*section),
            _ => None,
        }
    }
}
