//! Authentication module for filevault.
//!
//! This module provides password hashing, user registration,
//! HTTP Basic credential parsing and token sessions.

mod credentials;
mod password;
#[cfg(feature = "redis")]
mod redis;
mod registration;
mod session;

pub use credentials::{parse_basic_credentials, BasicCredentials};
pub use password::{hash_password, verify_password, PasswordError};
#[cfg(feature = "redis")]
pub use redis::RedisSessionStore;
pub use registration::{authenticate, register, RegistrationError, RegistrationRequest};
pub use session::{
    InMemorySessionStore, SessionError, SessionManager, SessionStore,
    DEFAULT_SESSION_DURATION_SECS,
};
