//! Account authentication
//!
//! The game server only needs `register`, `login` and `logout`; anything
//! that can answer those can back it. `InMemoryAuthenticator` keeps accounts
//! for the lifetime of the process with argon2-hashed passwords.

use std::sync::atomic::{AtomicU64, Ordering};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::AppError;
use crate::types::Identity;

/// An authenticated account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub identity: Identity,
    pub username: String,
}

/// Authentication backend
///
/// Calls may be slow (password hashing); the server runs them on the
/// blocking pool.
pub trait Authenticator: Send + Sync {
    fn register(&self, username: &str, password: &str) -> Result<UserIdentity, AppError>;
    fn login(&self, username: &str, password: &str) -> Result<UserIdentity, AppError>;
    fn logout(&self, identity: &Identity);
}

#[derive(Debug)]
struct Account {
    user_id: u64,
    password_hash: String,
}

/// Process-local account store
#[derive(Debug)]
pub struct InMemoryAuthenticator {
    accounts: DashMap<String, Account>,
    next_id: AtomicU64,
}

impl Default for InMemoryAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthenticator {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

fn validate(username: &str, password: &str) -> Result<String, AppError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::MissingCredentials);
    }
    Ok(username.to_string())
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

impl Authenticator for InMemoryAuthenticator {
    fn register(&self, username: &str, password: &str) -> Result<UserIdentity, AppError> {
        let username = validate(username, password)?;
        if self.accounts.contains_key(&username) {
            return Err(AppError::UsernameTaken);
        }

        let password_hash = hash_password(password)?;

        match self.accounts.entry(username.clone()) {
            Entry::Occupied(_) => Err(AppError::UsernameTaken),
            Entry::Vacant(vacant) => {
                let user_id = self.next_id.fetch_add(1, Ordering::Relaxed);
                vacant.insert(Account {
                    user_id,
                    password_hash,
                });
                info!("Registered account '{}' as user {}", username, user_id);
                Ok(UserIdentity {
                    identity: Identity::user(user_id),
                    username,
                })
            }
        }
    }

    fn login(&self, username: &str, password: &str) -> Result<UserIdentity, AppError> {
        let username = validate(username, password)?;
        let (user_id, password_hash) = self
            .accounts
            .get(&username)
            .map(|account| (account.user_id, account.password_hash.clone()))
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(password, &password_hash) {
            debug!("Rejected password for '{}'", username);
            return Err(AppError::InvalidCredentials);
        }

        Ok(UserIdentity {
            identity: Identity::user(user_id),
            username,
        })
    }

    fn logout(&self, identity: &Identity) {
        debug!("{} logged out", identity);
    }
}
