//! Input validation for registration and login.
//!
//! Single-field validators return the first problem they find.
//! [`validate_registration`] runs all of them and reports every failure at
//! once as [`ValidationError::Multiple`].
use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

/// Practical subset of RFC 5322.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Invalid email regex pattern")
});

/// Pakistani mobile/landline number, optional `+92` or `0` prefix.
static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+92|0)?[0-9]{10}$").expect("Invalid phone regex pattern"));

const MIN_NAME_CHARS: usize = 3;
const MIN_PASSWORD_CHARS: usize = 8;
const MAX_PASSWORD_CHARS: usize = 128;

/// Validates an email address
///
/// ```rust
/// use gatehouse_core::validation::validate_email;
///
/// assert!(validate_email("buyer@propertyhub.pk").is_ok());
/// assert!(validate_email("not-an-email").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::MissingField(
            "Email is required".to_string(),
        ));
    }

    if email.len() > 254 || !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Please enter a valid email address".to_string(),
        ));
    }

    Ok(())
}

/// Validates password strength for new accounts.
///
/// 8 to 128 characters with an upper-case letter, a lower-case letter and a
/// digit.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField(
            "Password is required".to_string(),
        ));
    }

    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ValidationError::InvalidPassword(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    if password.chars().count() > MAX_PASSWORD_CHARS {
        return Err(ValidationError::InvalidPassword(
            "Password must be no more than 128 characters long".to_string(),
        ));
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        return Err(ValidationError::InvalidPassword(
            "Password must contain uppercase, lowercase, and numbers".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_full_name(full_name: &str) -> Result<(), ValidationError> {
    if full_name.trim().chars().count() < MIN_NAME_CHARS {
        return Err(ValidationError::InvalidName(
            "Full name must be at least 3 characters long".to_string(),
        ));
    }
    Ok(())
}

/// Strip the spaces and hyphens people type into phone numbers.
pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_REGEX.is_match(&normalize_phone(phone)) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone(
            "Please enter a valid Pakistan phone number".to_string(),
        ))
    }
}

pub fn validate_password_confirmation(
    password: &str,
    confirm_password: &str,
) -> Result<(), ValidationError> {
    if password != confirm_password {
        return Err(ValidationError::InvalidPassword(
            "Passwords do not match".to_string(),
        ));
    }
    Ok(())
}

/// Login form fields must both be present before anything else is checked.
pub fn validate_login_fields(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ValidationError::MissingField(
            "Please enter both email and password".to_string(),
        ));
    }
    Ok(())
}

/// Run every registration rule and collect all failures.
pub fn validate_registration(
    full_name: &str,
    email: &str,
    phone: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), ValidationError> {
    let mut errors: Vec<ValidationError> = [
        validate_full_name(full_name),
        validate_email(email),
        validate_phone(phone),
        validate_password(password),
        validate_password_confirmation(password, confirm_password),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect();

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
