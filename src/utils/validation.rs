//! Centralized validation and helper functions.

/// Maximum number of UTF-16 code units a single compressed matrix cell may expand to
/// (decompression-bomb protection)
pub const MAX_DECODED_UNITS: usize = 1 << 20;

/// Maximum number of taxa or characters accepted in one multi-access key (DOS protection)
pub const MAX_RECORDS: usize = 100_000;

/// Maximum number of steps replayed for a single web request
pub const MAX_SESSION_STEPS: usize = 1_000;

/// Security-related constants for key identifiers taken from user input
pub const MAX_KEY_ID_LENGTH: usize = 128;

/// Security validation error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Empty key identifier provided")]
    EmptyKeyId,
    #[error("Key identifier too long: exceeds {MAX_KEY_ID_LENGTH} characters")]
    KeyIdTooLong,
    #[error("Invalid key identifier: contains path separators or invalid characters")]
    InvalidKeyId,
    #[error("Too many steps: exceeds maximum of {MAX_SESSION_STEPS}")]
    TooManySteps,
}

/// Validate a key identifier supplied by a user (URL path segment, CLI argument).
///
/// Identifiers come from file names and source ids, so only ASCII alphanumerics and
/// `-`, `_`, `.` are accepted, and `..` is rejected outright.
///
/// # Examples
///
/// ```
/// use key_solver::utils::validation::validate_key_id;
///
/// assert!(validate_key_id("1903").is_ok());
/// assert!(validate_key_id("key-115cc464-complete").is_ok());
/// assert!(validate_key_id("../etc/passwd").is_err());
/// ```
///
/// # Errors
///
/// Returns `ValidationError::EmptyKeyId` for blank input, `ValidationError::KeyIdTooLong`
/// past the length limit, or `ValidationError::InvalidKeyId` for anything else unsafe.
pub fn validate_key_id(id: &str) -> Result<&str, ValidationError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ValidationError::EmptyKeyId);
    }
    if id.len() > MAX_KEY_ID_LENGTH {
        return Err(ValidationError::KeyIdTooLong);
    }
    if id.contains("..")
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ValidationError::InvalidKeyId);
    }
    Ok(id)
}

/// Check if adding another record would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new record.
/// Returns an error message if adding would exceed the limit, None if safe to add.
#[must_use]
pub fn check_record_limit(count: usize) -> Option<String> {
    if count >= MAX_RECORDS {
        Some(format!(
            "Too many records: adding another would exceed maximum of {MAX_RECORDS}"
        ))
    } else {
        None
    }
}

/// Parse one field of a measurement payload.
///
/// Like the browser `parseFloat` the source data was written for, this reads the
/// longest numeric prefix (`"12.5mm"` is 12.5) and yields NaN when there is none.
#[must_use]
pub fn parse_measure_field(field: &str) -> f64 {
    let field = field.trim_start();
    let end = field
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);

    // Shrink until the prefix parses ("1e", "5-10")
    (1..=end)
        .rev()
        .find_map(|len| field.get(..len).and_then(|s| s.parse::<f64>().ok()))
        .unwrap_or(f64::NAN)
}

/// Parse a numeric observation typed by a user. Accepts a decimal comma.
#[must_use]
pub fn parse_observation(input: &str) -> Option<f64> {
    let normalized = input.trim().replace(',', ".");
    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_id_safe() {
        assert_eq!(validate_key_id("1903"), Ok("1903"));
        assert_eq!(validate_key_id(" 42 "), Ok("42"));
        assert!(validate_key_id("key-2aca28ae-4324.json").is_ok());
    }

    #[test]
    fn test_validate_key_id_dangerous() {
        let attempts = ["../secret", "a/b", "a\\b", "key\0", "..", "with space"];
        for attempt in attempts {
            assert_eq!(
                validate_key_id(attempt),
                Err(ValidationError::InvalidKeyId),
                "{attempt:?} should be rejected"
            );
        }
        assert_eq!(validate_key_id("  "), Err(ValidationError::EmptyKeyId));
        assert_eq!(
            validate_key_id(&"k".repeat(MAX_KEY_ID_LENGTH + 1)),
            Err(ValidationError::KeyIdTooLong)
        );
    }

    #[test]
    fn test_check_record_limit() {
        assert!(check_record_limit(0).is_none());
        assert!(check_record_limit(MAX_RECORDS - 1).is_none());
        assert!(check_record_limit(MAX_RECORDS).is_some());
    }

    #[test]
    fn test_parse_measure_field() {
        assert!((parse_measure_field("12.5") - 12.5).abs() < f64::EPSILON);
        assert!((parse_measure_field(" 7") - 7.0).abs() < f64::EPSILON);
        assert!((parse_measure_field("-3") + 3.0).abs() < f64::EPSILON);
        assert!((parse_measure_field("12.5mm") - 12.5).abs() < f64::EPSILON);
        assert!((parse_measure_field("3.") - 3.0).abs() < f64::EPSILON);
        assert!((parse_measure_field("1e") - 1.0).abs() < f64::EPSILON);
        assert!((parse_measure_field("5-10") - 5.0).abs() < f64::EPSILON);
        assert!((parse_measure_field("1e+2") - 100.0).abs() < f64::EPSILON);
        assert!(parse_measure_field("").is_nan());
        assert!(parse_measure_field("mean").is_nan());
    }

    #[test]
    fn test_parse_observation() {
        assert_eq!(parse_observation("7"), Some(7.0));
        assert_eq!(parse_observation(" 2,5 "), Some(2.5));
        assert_eq!(parse_observation("inf"), None);
        assert_eq!(parse_observation("abc"), None);
    }
}
