use crate::session::errors::AuthError;
use crate::session::errors::ValidationErrors;
use crate::session::models::EmailAddress;
use crate::session::models::RegisterCommand;
use crate::session::models::Username;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;
const MIN_CHARACTER_CLASSES: usize = 3;

/// Registration input that passed field validation.
#[derive(Debug)]
pub struct ValidRegistration {
    pub email: EmailAddress,
    pub user_name: Username,
}

/// Check the shape of a registration request.
///
/// Field problems are collected together so a client can show all of them at
/// once; password strength is judged only after the fields are clean.
///
/// # Errors
/// * `ValidationFailed` - One or more fields are missing or malformed
/// * `WeakPassword` - Password does not meet the strength policy
pub fn validate_registration(command: &RegisterCommand) -> Result<ValidRegistration, AuthError> {
    let mut errors = ValidationErrors::new();

    let email = if command.email.trim().is_empty() {
        errors.add("email", "email is required");
        None
    } else {
        EmailAddress::new(&command.email)
            .map_err(|e| errors.add("email", e))
            .ok()
    };

    let user_name = if command.user_name.trim().is_empty() {
        errors.add("user_name", "user name is required");
        None
    } else {
        Username::new(command.user_name.trim().to_string())
            .map_err(|e| errors.add("user_name", e))
            .ok()
    };

    if command.password.trim().is_empty() {
        errors.add("password", "password is required");
    }

    if command.password != command.confirm_password {
        errors.add("confirm_password", "passwords do not match");
    }

    match (email, user_name) {
        (Some(email), Some(user_name)) if errors.is_empty() => {
            check_password_strength(&command.password)?;
            Ok(ValidRegistration { email, user_name })
        }
        _ => Err(AuthError::ValidationFailed(errors)),
    }
}

/// Enforce the password policy: eight to 128 characters drawn from at least
/// three of upper case, lower case, digits and symbols.
///
/// # Errors
/// * `WeakPassword` - Policy not met
pub fn check_password_strength(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {} characters long",
            MAX_PASSWORD_LENGTH
        )));
    }

    let classes = [
        password.chars().any(|c| c.is_uppercase()),
        password.chars().any(|c| c.is_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| c.is_ascii_punctuation()),
    ];

    if classes.iter().filter(|present| **present).count() < MIN_CHARACTER_CLASSES {
        return Err(AuthError::WeakPassword(
            "password must contain at least 3 of: uppercase, lowercase, numbers, special characters"
                .to_string(),
        ));
    }

    Ok(())
}
