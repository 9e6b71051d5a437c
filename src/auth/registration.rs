//! User registration and credential checks for filevault.

use thiserror::Error;
use tracing::{error, info};

use crate::auth::{hash_password, verify_password, PasswordError};
use crate::db::{NewUser, User, UserRepository};
use crate::VaultError;

/// Registration-specific errors.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// No email was supplied.
    #[error("Missing email")]
    MissingEmail,

    /// No password was supplied.
    #[error("Missing password")]
    MissingPassword,

    /// The email is already registered.
    #[error("Already exist")]
    AlreadyExists,

    /// Store or hashing failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PasswordError> for RegistrationError {
    fn from(e: PasswordError) -> Self {
        RegistrationError::Internal(e.to_string())
    }
}

/// Registration request data.
///
/// Both fields are optional so that absent and empty input are reported the same way.
#[derive(Debug, Clone, Default)]
pub struct RegistrationRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl RegistrationRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Register a new user.
///
/// Checks run in order: email present, password present, email unused.
/// The password is stored as an Argon2 hash.
pub async fn register(
    repo: &UserRepository<'_>,
    request: &RegistrationRequest,
) -> Result<User, RegistrationError> {
    let email = non_empty(&request.email).ok_or(RegistrationError::MissingEmail)?;
    let password = non_empty(&request.password).ok_or(RegistrationError::MissingPassword)?;

    let existing = repo
        .get_by_email(email)
        .await
        .map_err(|e| RegistrationError::Internal(e.to_string()))?;
    if existing.is_some() {
        return Err(RegistrationError::AlreadyExists);
    }

    let password_hash = hash_password(password)?;

    // A concurrent registration can still win the race; the unique index decides.
    let user = repo
        .create(&NewUser::new(email, password_hash))
        .await
        .map_err(|e| match e {
            VaultError::Validation(_) => RegistrationError::AlreadyExists,
            other => {
                error!("Failed to create user: {}", other);
                RegistrationError::Internal(other.to_string())
            }
        })?;

    info!("User registered: id={}", user.id);
    Ok(user)
}

/// Check an email/password pair.
///
/// Returns `None` when the email is unknown or the password does not match.
pub async fn authenticate(
    repo: &UserRepository<'_>,
    email: &str,
    password: &str,
) -> crate::Result<Option<User>> {
    let Some(user) = repo.get_by_email(email).await? else {
        return Ok(None);
    };

    match verify_password(password, &user.password) {
        Ok(()) => Ok(Some(user)),
        Err(PasswordError::VerificationFailed) => Ok(None),
        Err(e) => Err(VaultError::Auth(e.to_string())),
    }
}
