use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::error::{ClientError, Result};

/// Credential and identity of a logged-in user.
///
/// The token is issued elsewhere and passed through verbatim. Clones share
/// one validity flag, so invalidating any clone (logout, or the service
/// rejecting the token) blocks every holder at once.
#[derive(Clone)]
pub struct Session {
    token: Arc<str>,
    username: Arc<str>,
    valid: Arc<AtomicBool>,
}

impl Session {
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let username = username.into();
        if token.trim().is_empty() || username.trim().is_empty() {
            return Err(ClientError::NotAuthenticated);
        }
        Ok(Self {
            token: token.into(),
            username: username.into(),
            valid: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    pub fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ClientError::NotAuthenticated)
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .field("valid", &self.is_valid())
            .finish()
    }
}
