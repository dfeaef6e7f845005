//! Custom validation functions for configuration.
//!
//! Provides shared validation logic used across multiple configuration modules.

use std::collections::HashSet;

use validator::ValidationError;

/// Validate the traffic generator port list: at least two distinct, non-empty names.
pub fn validate_port_names(ports: &[String]) -> Result<(), ValidationError> {
    if ports.len() < 2 {
        return Err(ValidationError::new("too_few_ports"));
    }
    if ports.iter().any(|p| p.trim().is_empty()) {
        return Err(ValidationError::new("empty_port_name"));
    }
    let unique: HashSet<&str> = ports.iter().map(String::as_str).collect();
    if unique.len() != ports.len() {
        return Err(ValidationError::new("duplicate_port_name"));
    }
    Ok(())
}

/// Validate an L1 speed token such as `SPEED_100_GBPS`.
pub fn validate_speed(speed: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^SPEED_[0-9]+_(M|G)BPS$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(speed) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_speed"))
    }
}
