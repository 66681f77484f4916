//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};

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
    if value.is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate a fraction in the half-open range [0, 1)
pub fn validate_fraction(value: f64, field_name: &str, domain: &str) -> ConfigResult<()> {
    if !(0.0..1.0).contains(&value) {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be in [0, 1), got {}", field_name, value),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_string() {
        assert!(validate_required_string("value", "field", "domain").is_ok());
        assert!(validate_required_string("", "field", "domain").is_err());
    }

    #[test]
    fn test_positive() {
        assert!(validate_positive(1usize, "field", "domain").is_ok());
        assert!(validate_positive(0usize, "field", "domain").is_err());
    }

    #[test]
    fn test_fraction() {
        assert!(validate_fraction(0.0, "field", "domain").is_ok());
        assert!(validate_fraction(0.1, "field", "domain").is_ok());
        assert!(validate_fraction(1.0, "field", "domain").is_err());
        assert!(validate_fraction(-0.1, "field", "domain").is_err());
    }
}
