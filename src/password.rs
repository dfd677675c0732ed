//! This file defines types that handle password validation and hashing.
//! `ValidatedPassword` wraps a string and ensures it satisfies the password policy.
//! `PasswordHash` converts a `ValidatedPassword` into a salted and hashed password.

use std::fmt::Display;

use bcrypt::{BcryptError, hash, verify};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The minimum number of characters a password must have.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A password must contain at least one of these characters.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// A password that has been validated, but not yet hashed.
///
/// This struct can be used to construct a [PasswordHash].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Create and validate a new password from a string.
    ///
    /// A valid password has at least [MIN_PASSWORD_LENGTH] characters, contains
    /// at least one character from [SPECIAL_CHARACTERS], and otherwise consists
    /// only of ASCII letters and digits.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidCredentials] if the password
    /// does not satisfy the policy.
    pub fn new(raw_password_string: &str) -> Result<Self, Error> {
        if is_valid_password(raw_password_string) {
            Ok(Self(raw_password_string.to_string()))
        } else {
            Err(Error::InvalidCredentials)
        }
    }

    /// Create a new `ValidatedPassword` without any validation.
    ///
    /// The caller should ensure that `raw_password_string` is a valid and secure password.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if an invalid password is provided it may cause incorrect behaviour but will not affect memory safety.
    pub fn new_unchecked(raw_password_string: &str) -> Self {
        Self(raw_password_string.to_string())
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", str::repeat("*", 8))
    }
}

fn is_special(c: char) -> bool {
    SPECIAL_CHARACTERS.contains(c)
}

fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(is_special)
        && password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || is_special(c))
}

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// An alias for the default encryption cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Create a hashed password from a validated password with the specified `cost`.
    ///
    /// `cost` increases the rounds of hashing and therefore the time needed to verify a password.
    /// A value of at least 12 is recommended. Pass in [PasswordHash::DEFAULT_COST] to use the recommended cost.
    ///
    /// # Errors
    ///
    /// This function will return an error if the password could not be hashed.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        match hash(&password.0, cost) {
            Ok(password_hash) => Ok(Self(password_hash)),
            Err(e) => Err(Error::HashingError(e.to_string())),
        }
    }

    /// Create a new `PasswordHash` without any validation.
    ///
    /// The caller should ensure that `raw_password_hash` is a valid password hash.
    pub fn new_unchecked(raw_password_hash: &str) -> Self {
        Self(raw_password_hash.to_string())
    }

    /// Try to create a password hash from a raw password string.
    ///
    /// This is a convenience function that removes the need to manually create
    /// the intermediate `ValidatedPassword` type.
    pub fn from_raw_password(raw_password: &str, cost: u32) -> Result<Self, Error> {
        let validated_password = ValidatedPassword::new(raw_password)?;
        PasswordHash::new(validated_password, cost)
    }

    /// Check that `raw_password` matches the stored password.
    pub fn verify(&self, raw_password: &str) -> Result<bool, BcryptError> {
        verify(raw_password, &self.0)
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
