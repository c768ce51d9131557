//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates the option list of a poll create request: at least two options,
/// none of them blank.
pub fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if options.len() < 2 {
        let mut err = ValidationError::new("options_count");
        err.message = Some(
            format!(
                "a poll needs at least 2 options (got {})",
                options.len()
            )
            .into(),
        );
        return Err(err);
    }

    if options.iter().any(|text| text.trim().is_empty()) {
        let mut err = ValidationError::new("options_blank");
        err.message = Some("poll options must not be blank".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|text| text.to_string()).collect()
    }

    #[test]
    fn test_validate_options_valid() {
        assert!(validate_options(&opts(&["A", "B"])).is_ok());
        assert!(validate_options(&opts(&["yes", "no", "maybe"])).is_ok());
    }

    #[test]
    fn test_validate_options_too_few() {
        assert!(validate_options(&opts(&[])).is_err());
        assert!(validate_options(&opts(&["only one"])).is_err());
    }

    #[test]
    fn test_validate_options_blank_entries() {
        assert!(validate_options(&opts(&["A", ""])).is_err());
        assert!(validate_options(&opts(&["A", "   "])).is_err());
    }
}
