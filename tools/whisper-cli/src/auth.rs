//! User registration and login.
//!
//! Password hashing and storage live here, outside the messaging core:
//! the core only ever sees this table through [`RoleProvider`].

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use whisper_common::identity::Role;
use whisper_core::access::RoleProvider;
use whisper_core::store::Table;

/// Email domain accepted at registration.
pub const ALLOWED_EMAIL_DOMAIN: &str = "@dartmouth.edu";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("only @dartmouth.edu email addresses are allowed")]
    EmailNotAllowed,

    #[error("username already exists")]
    UsernameTaken,

    #[error("email address already registered")]
    EmailTaken,

    #[error(transparent)]
    Store(#[from] whisper_core::Error),
}

/// One registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub password_hash: String,
    pub salt: String,
    pub role: Role,
    pub email: String,
}

/// Contents of the user table.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserTable {
    pub users: BTreeMap<String, UserRecord>,
}

/// Registration, login and role lookup over the user table.
pub struct UserStore {
    table: Arc<Table<UserTable>>,
}

impl UserStore {
    pub fn new(table: Arc<Table<UserTable>>) -> Self {
        Self { table }
    }

    /// Register a new account. Usernames and emails are unique; the
    /// password is stored as a salted SHA-256 digest.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
        email: &str,
    ) -> Result<(), AuthError> {
        if !is_allowed_email(email) {
            return Err(AuthError::EmailNotAllowed);
        }
        self.table.with_lock(|table| {
            if table.users.contains_key(username) {
                return Err(AuthError::UsernameTaken);
            }
            if table.users.values().any(|u| u.email == email) {
                return Err(AuthError::EmailTaken);
            }
            let salt = fresh_salt();
            let record = UserRecord {
                password_hash: hash_password(password, &salt),
                salt,
                role,
                email: email.to_string(),
            };
            table.users.insert(username.to_string(), record);
            Ok(())
        })
    }

    /// `true` iff the credentials match a registered account.
    pub fn login(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        Ok(self.table.read(|table| {
            table
                .users
                .get(username)
                .map(|user| hash_password(password, &user.salt) == user.password_hash)
                .unwrap_or(false)
        })?)
    }
}

impl RoleProvider for UserStore {
    fn role_of(&self, identity: &str) -> Option<Role> {
        // A busy table reads as unknown, which fails closed.
        self.table
            .read(|table| table.users.get(identity).map(|u| u.role))
            .ok()
            .flatten()
    }
}

fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

fn fresh_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_allowed_email(email: &str) -> bool {
    email
        .strip_suffix(ALLOWED_EMAIL_DOMAIN)
        .is_some_and(|local| !local.is_empty() && !local.contains('@'))
}
