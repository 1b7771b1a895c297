//! Opaque, salted identifiers for sessions in URLs.
//!
//! Tokens are hashids: one salt per session kind and a minimum length. Decoding only accepts a
//! token that re-encodes to itself, so each id has exactly one valid token per salt.

use std::fmt;

use harsh::Harsh;
use thiserror::Error;

use super::domain::{SessionKind, SessionRef};
use crate::config::IdentifierConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("token is empty")]
    Empty,
    #[error("token does not decode to a single id")]
    Malformed,
    #[error("token is not in canonical form")]
    NonCanonical,
    #[error("session codec could not be built: {0}")]
    Setup(String),
}

#[derive(Clone)]
pub struct SessionCodec {
    harsh: Harsh,
    min_length: usize,
}

impl fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCodec")
            .field("min_length", &self.min_length)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    pub fn new(salt: &str, min_length: usize) -> Result<Self, CodecError> {
        let harsh = Harsh::builder()
            .salt(salt)
            .length(min_length)
            .build()
            .map_err(|err| CodecError::Setup(err.to_string()))?;
        Ok(Self { harsh, min_length })
    }

    pub fn encode(&self, id: u64) -> String {
        self.harsh.encode(&[id])
    }

    pub fn decode(&self, token: &str) -> Result<u64, CodecError> {
        if token.is_empty() {
            return Err(CodecError::Empty);
        }
        let values = self
            .harsh
            .decode(token)
            .map_err(|_| CodecError::Malformed)?;
        let [id] = values[..] else {
            return Err(CodecError::Malformed);
        };
        if self.encode(id) != token {
            return Err(CodecError::NonCanonical);
        }
        Ok(id)
    }
}

/// Per-kind codecs. Real and practice sessions use different salts, so a token minted for one
/// kind never resolves to the same id under the other.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    placement: SessionCodec,
    dummy: SessionCodec,
}

impl SessionTokens {
    pub fn new(
        placement_salt: &str,
        dummy_salt: &str,
        min_length: usize,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            placement: SessionCodec::new(placement_salt, min_length)?,
            dummy: SessionCodec::new(dummy_salt, min_length)?,
        })
    }

    pub fn from_config(config: &IdentifierConfig) -> Result<Self, CodecError> {
        Self::new(
            &config.session_salt,
            &config.dummy_session_salt,
            config.token_min_length,
        )
    }

    pub fn codec(&self, kind: SessionKind) -> &SessionCodec {
        match kind {
            SessionKind::Placement => &self.placement,
            SessionKind::Dummy => &self.dummy,
        }
    }

    pub fn encode(&self, session: SessionRef) -> String {
        self.codec(session.kind()).encode(session.raw_id())
    }

    pub fn decode(&self, kind: SessionKind, token: &str) -> Result<SessionRef, CodecError> {
        let id = self.codec(kind).decode(token)?;
        Ok(SessionRef::from_parts(kind, id))
    }
}
