use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::Role;
use crate::{AppError, ErrorKind, SESSION_RECORD_VERSION};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("username is empty")]
    EmptyUsername,
    #[error("token is empty")]
    EmptyToken,
    #[error("failed to encode session record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode session record: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("unsupported session record version {0}")]
    UnsupportedVersion(u32),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::EmptyUsername | SessionError::EmptyToken => {
                AppError::new(ErrorKind::AuthenticationFailed, "Login failed")
                    .with_internal(e.to_string())
            }
            SessionError::Encode(_)
            | SessionError::Decode(_)
            | SessionError::UnsupportedVersion(_) => {
                AppError::new(ErrorKind::Storage, "Stored session is unreadable")
                    .with_internal(e.to_string())
            }
        }
    }
}

/// The signed-in user. The bearer token never leaves this type unredacted
/// except through [`Session::bearer_header`] and the persisted record.
#[derive(Debug)]
pub struct Session {
    username: String,
    role: Role,
    token: SecretString,
}

impl Session {
    pub fn new(username: String, role: Role, token: String) -> Result<Self, SessionError> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(SessionError::EmptyUsername);
        }
        if token.trim().is_empty() {
            return Err(SessionError::EmptyToken);
        }
        Ok(Self {
            username,
            role,
            token: SecretString::new(token),
        })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

#[derive(Serialize)]
struct RecordRef<'a> {
    version: u32,
    username: &'a str,
    role: Role,
    token: &'a str,
}

#[derive(Deserialize)]
struct Record {
    version: u32,
    username: String,
    role: Role,
    token: SecretString,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("version", &self.version)
            .field("username", &self.username)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

pub fn encode(session: &Session) -> Result<Vec<u8>, SessionError> {
    serde_json::to_vec(&RecordRef {
        version: SESSION_RECORD_VERSION,
        username: &session.username,
        role: session.role,
        token: session.token.expose_secret(),
    })
    .map_err(SessionError::Encode)
}

pub fn decode(bytes: &[u8]) -> Result<Session, SessionError> {
    let record: Record = serde_json::from_slice(bytes).map_err(SessionError::Decode)?;
    if record.version != SESSION_RECORD_VERSION {
        return Err(SessionError::UnsupportedVersion(record.version));
    }
    Session::new(
        record.username,
        record.role,
        record.token.expose_secret().clone(),
    )
}
