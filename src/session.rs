//! Admin sessions.
//!
//! There is a single admin credential: an Argon2 hash from config. A successful
//! login mints a random session token, held in memory with a TTL, plus a CSRF
//! token that cookie-authenticated requests must echo back.

use crate::app_config::AdminConfig;
use crate::middleware::csrf::generate_csrf_token;
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use moka::sync::Cache;
use std::time::Duration;
use uuid::Uuid;

/// Upper bound on concurrently live admin sessions.
const MAX_SESSIONS: u64 = 64;

#[derive(Clone, Debug)]
pub struct AdminSession {
    pub token: Uuid,
    pub csrf_token: String,
}

/// Live admin sessions keyed by token.
pub struct AdminSessions {
    sessions: Cache<Uuid, AdminSession>,
    password_hash: Option<String>,
}

impl AdminSessions {
    /// An empty `password_hash` disables login.
    pub fn new(password_hash: &str, ttl: Duration) -> Self {
        let password_hash = match password_hash.trim() {
            "" => None,
            hash => Some(hash.to_owned()),
        };

        Self {
            sessions: Cache::builder()
                .max_capacity(MAX_SESSIONS)
                .time_to_live(ttl)
                .build(),
            password_hash,
        }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(
            &config.password_hash,
            Duration::from_secs(config.session_timeout_minutes.max(1) as u64 * 60),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn verify_password(&self, password: &str) -> bool {
        let Some(hash) = self.password_hash.as_deref() else {
            return false;
        };

        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::error!("Admin password hash is not a valid PHC string: {}", e);
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    pub fn create_session(&self) -> AdminSession {
        let session = AdminSession {
            token: Uuid::new_v4(),
            csrf_token: generate_csrf_token(),
        };
        self.sessions.insert(session.token, session.clone());
        session
    }

    /// Check the password and open a session on success.
    pub fn login(&self, password: &str) -> Option<AdminSession> {
        if self.verify_password(password) {
            Some(self.create_session())
        } else {
            None
        }
    }

    pub fn authenticate(&self, token: &Uuid) -> Option<AdminSession> {
        self.sessions.get(token)
    }

    pub fn remove_session(&self, token: &Uuid) {
        self.sessions.invalidate(token);
    }
}

/// Hash a password into a PHC string suitable for `admin.password_hash`.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}
