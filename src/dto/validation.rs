//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest reaction payload accepted, in characters.
const MAX_EMOJI_CHARS: usize = 8;

/// Validates that a reaction is a short run of non-alphanumeric, non-whitespace symbols.
///
/// # Examples
///
/// ```ignore
/// validate_emoji("🔥")     // Ok
/// validate_emoji("hello")  // Err - letters
/// validate_emoji("")       // Err - empty
/// ```
pub fn validate_emoji(emoji: &str) -> Result<(), ValidationError> {
    let count = emoji.chars().count();
    if count == 0 || count > MAX_EMOJI_CHARS {
        let mut err = ValidationError::new("emoji_length");
        err.message = Some(
            format!("Reaction must hold 1 to {MAX_EMOJI_CHARS} characters (got {count})").into(),
        );
        return Err(err);
    }

    if emoji
        .chars()
        .any(|c| c.is_alphanumeric() || c.is_whitespace() || c.is_control())
    {
        let mut err = ValidationError::new("emoji_format");
        err.message = Some("Reaction must only contain emoji symbols".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_emoji_valid() {
        assert!(validate_emoji("🔥").is_ok());
        assert!(validate_emoji("😂😂").is_ok());
        assert!(validate_emoji("❤️").is_ok());
    }

    #[test]
    fn test_validate_emoji_invalid_length() {
        assert!(validate_emoji("").is_err());
        assert!(validate_emoji("🔥🔥🔥🔥🔥🔥🔥🔥🔥").is_err());
    }

    #[test]
    fn test_validate_emoji_invalid_format() {
        assert!(validate_emoji("hi").is_err());
        assert!(validate_emoji("🔥 ").is_err());
        assert!(validate_emoji("3").is_err());
    }
}
