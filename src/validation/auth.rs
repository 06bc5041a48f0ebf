use crate::error::{AppError, Result};

/// Validates that a login request carries both a user and a password.
///
/// # Arguments
///
/// * `user` - The submitted user name.
/// * `pass` - The submitted password.
///
/// # Returns
///
/// A `Result<()>` indicating whether both values are present.
pub fn validate_credentials_present(user: &str, pass: &str) -> Result<()> {
    if user.is_empty() || pass.is_empty() {
        return Err(AppError::Validation("Missing credentials".to_string()));
    }

    Ok(())
}

/// Validates that a passcode was submitted.
pub fn validate_passcode_present(passcode: &str) -> Result<()> {
    if passcode.is_empty() {
        return Err(AppError::Validation("Missing passcode".to_string()));
    }

    Ok(())
}
