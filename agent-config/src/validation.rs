//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};
use std::time::Duration;

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate that a timeout is non-zero
pub fn validate_timeout(value: Duration, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.is_zero() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0 seconds", field_name),
        });
    }
    Ok(())
}

/// Validate that an environment variable name is usable
pub fn validate_env_var_name(name: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_required_string(name, field_name, domain)?;
    if name.contains('=') || name.contains('\0') {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} '{}' is not a valid environment variable name", field_name, name),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_string_rejects_blank() {
        assert!(validate_required_string("  ", "name", "test").is_err());
        assert!(validate_required_string("x", "name", "test").is_ok());
    }

    #[test]
    fn test_env_var_name() {
        assert!(validate_env_var_name("TFSBUILD", "marker", "process").is_ok());
        assert!(validate_env_var_name("A=B", "marker", "process").is_err());
    }
}
