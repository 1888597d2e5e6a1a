//! Configuration validation logic
//!
//! Every section validates its own ranges and formats and reports the first
//! offending field.

use crate::config::error::ConfigError;
use crate::config::settings::{
    DatabaseConfig, FileSettings, LoggerSettings, SchedulerConfig, Settings, SmtpConfig, TlsMode,
};

/// Valid log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid log formats
const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

impl DatabaseConfig {
    /// Validate database configuration
    ///
    /// # Validation Rules
    /// - URL must not be empty and must use a PostgreSQL scheme
    /// - Max and min connections must be greater than 0
    /// - Min connections must not exceed max connections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::invalid(
                "database.url",
                "Database URL is required. Please specify a valid database connection string.",
            ));
        }

        if !self.is_valid_database_url() {
            return Err(ConfigError::invalid(
                "database.url",
                "Invalid database URL format. Expected format: postgres://[user:password@]host[:port]/database",
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::invalid(
                "database.max_connections",
                "Max connections must be greater than 0.",
            ));
        }

        if self.min_connections == 0 {
            return Err(ConfigError::invalid(
                "database.min_connections",
                "Min connections must be greater than 0.",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::invalid(
                "database.min_connections",
                format!(
                    "Min connections ({}) cannot exceed max connections ({}).",
                    self.min_connections, self.max_connections
                ),
            ));
        }

        if self.connection_timeout == 0 {
            return Err(ConfigError::invalid(
                "database.connection_timeout",
                "Connection timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }

    fn is_valid_database_url(&self) -> bool {
        ["postgres://", "postgresql://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
    }
}

impl SmtpConfig {
    /// Validate SMTP configuration
    ///
    /// # Validation Rules
    /// - Host must not be empty and port must not be 0
    /// - A password requires a username
    /// - A sender address must be available (`from` or `username`)
    /// - Credentials over `tls = "none"` are refused
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid(
                "smtp.host",
                "SMTP host is required.",
            ));
        }

        if self.port == 0 {
            return Err(ConfigError::invalid(
                "smtp.port",
                "Port must be between 1 and 65535.",
            ));
        }

        if !self.password.is_empty() && self.username.is_empty() {
            return Err(ConfigError::invalid(
                "smtp.username",
                "A username is required when a password is set.",
            ));
        }

        if self.sender().trim().is_empty() {
            return Err(ConfigError::invalid(
                "smtp.from",
                "A sender address is required. Set smtp.from or smtp.username.",
            ));
        }

        if self.tls == TlsMode::None && !self.password.is_empty() {
            return Err(ConfigError::invalid(
                "smtp.tls",
                "Refusing to send credentials without TLS. Use starttls or implicit.",
            ));
        }

        Ok(())
    }
}

impl SchedulerConfig {
    /// Validate scheduler configuration
    ///
    /// # Validation Rules
    /// - Poll interval must be at least 1 second
    /// - At least one worker
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "scheduler.poll_interval_secs",
                "Poll interval must be greater than 0 seconds.",
            ));
        }

        if self.workers == 0 {
            return Err(ConfigError::invalid(
                "scheduler.workers",
                "At least one worker is required.",
            ));
        }

        Ok(())
    }
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::invalid(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "logger.file.format",
                format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        if self.enabled && (self.rotation.max_size == 0 || self.rotation.max_files == 0) {
            return Err(ConfigError::invalid(
                "logger.file.rotation",
                "Rotation max_size and max_files must be greater than 0.",
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// Validate logger settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "logger.level",
                format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        self.file.validate()?;

        Ok(())
    }
}

impl Settings {
    /// Validate all configuration settings, returning the first error found
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.smtp.validate()?;
        self.scheduler.validate()?;
        self.logger.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: ConfigError) -> String {
        match err.field() {
            Some(field) => field.to_string(),
            None => panic!("Expected an invalid setting, got: {:?}", err),
        }
    }

    fn valid_smtp() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            username: "robot@example.com".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_database_config_valid() {
        let config = DatabaseConfig {
            url: "postgres://localhost/test".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_config_empty_url() {
        let err = DatabaseConfig::default().validate().unwrap_err();
        assert_eq!(field_of(err), "database.url");
    }

    #[test]
    fn test_database_config_rejects_other_schemes() {
        let config = DatabaseConfig {
            url: "mysql://localhost/db".to_string(),
            ..Default::default()
        };
        assert_eq!(field_of(config.validate().unwrap_err()), "database.url");
    }

    #[test]
    fn test_database_config_min_exceeds_max() {
        let config = DatabaseConfig {
            url: "postgresql://localhost/db".to_string(),
            max_connections: 2,
            min_connections: 3,
            ..Default::default()
        };
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "database.min_connections"
        );
    }

    #[test]
    fn test_smtp_config_valid() {
        assert!(valid_smtp().validate().is_ok());
    }

    #[test]
    fn test_smtp_config_requires_sender() {
        let config = SmtpConfig::default();
        assert_eq!(field_of(config.validate().unwrap_err()), "smtp.from");

        let config = SmtpConfig {
            from: Some("noreply@example.com".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_smtp_config_password_without_username() {
        let config = SmtpConfig {
            username: String::new(),
            from: Some("noreply@example.com".to_string()),
            ..valid_smtp()
        };
        assert_eq!(field_of(config.validate().unwrap_err()), "smtp.username");
    }

    #[test]
    fn test_smtp_config_refuses_plaintext_credentials() {
        let config = SmtpConfig {
            tls: TlsMode::None,
            ..valid_smtp()
        };
        assert_eq!(field_of(config.validate().unwrap_err()), "smtp.tls");
    }

    #[test]
    fn test_smtp_config_zero_port() {
        let config = SmtpConfig {
            port: 0,
            ..valid_smtp()
        };
        assert_eq!(field_of(config.validate().unwrap_err()), "smtp.port");
    }

    #[test]
    fn test_scheduler_config_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_scheduler_config_zero_interval() {
        let config = SchedulerConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "scheduler.poll_interval_secs"
        );
    }

    #[test]
    fn test_scheduler_config_zero_workers() {
        let config = SchedulerConfig {
            workers: 0,
            ..Default::default()
        };
        assert_eq!(field_of(config.validate().unwrap_err()), "scheduler.workers");
    }

    #[test]
    fn test_logger_settings_invalid_level() {
        let settings = LoggerSettings {
            level: "verbose".to_string(),
            ..Default::default()
        };
        assert_eq!(field_of(settings.validate().unwrap_err()), "logger.level");
    }

    #[test]
    fn test_logger_settings_enabled_file_needs_path() {
        let mut settings = LoggerSettings::default();
        settings.file.enabled = true;
        settings.file.path = "   ".to_string();
        assert_eq!(
            field_of(settings.validate().unwrap_err()),
            "logger.file.path"
        );
    }

    #[test]
    fn test_settings_validate_reports_first_section() {
        let settings = Settings {
            database: DatabaseConfig {
                url: "postgres://localhost/mail".to_string(),
                ..Default::default()
            },
            smtp: valid_smtp(),
            scheduler: SchedulerConfig {
                workers: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            field_of(settings.validate().unwrap_err()),
            "scheduler.workers"
        );
    }
}
