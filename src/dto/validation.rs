//! Validation helpers for DTOs.

use validator::ValidationError;

/// Number of characters in a room code.
pub const ROOM_CODE_LENGTH: usize = 6;
/// Highest rating a player can give an entry.
pub const MAX_RATING: u8 = 5;
/// Sentinel rating submitted for a player's own entry ("no self-rating").
pub const SELF_SKIP_RATING: u8 = 0;

/// Validates that a room code is exactly 6 uppercase alphanumeric characters.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("A1B2C3") // Ok
/// validate_room_code("a1b2c3") // Err - lowercase
/// validate_room_code("A1B2C")  // Err - too short
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != ROOM_CODE_LENGTH {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be exactly {ROOM_CODE_LENGTH} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must contain only characters A-Z and 0-9".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a submitted rating: 1 to 5, or the self-skip sentinel 0.
pub fn validate_rating(rating: u8) -> Result<(), ValidationError> {
    if rating > MAX_RATING {
        let mut err = ValidationError::new("rating_range");
        err.message =
            Some(format!("Rating must be between 1 and {MAX_RATING}, or 0 to skip").into());
        return Err(err);
    }
    Ok(())
}
