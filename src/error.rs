//! # Error taxonomy
//!
//! Mirrors the error design in §7 of the specification: invalid input is
//! surfaced and never retried; cluster "not found" means different things
//! depending on call site; partial-delete failures are concatenated rather
//! than short-circuited; transient side-channel failures are logged and
//! swallowed at their call site rather than modeled as a variant here.

use thiserror::Error;

/// Errors raised by the Kubernetes object naming layer.
#[derive(Debug, Error)]
pub enum NameError {
    #[error("identifier must not be empty")]
    Empty,
}

/// Errors raised by the encryption service layer.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("key material must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("failed to read local encryption key: {0}")]
    KeyLoad(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("no encryption service registered for algorithm={algorithm:?} key_id={key_id:?}")]
    NoServiceRegistered {
        algorithm: Option<String>,
        key_id: Option<String>,
    },

    #[error("KMS operation failed: {0}")]
    Kms(String),
}

/// Errors talking to the Kubernetes API surface (or its fake, in tests).
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{resource} {name} not found in namespace {namespace}")]
    NotFound {
        resource: &'static str,
        namespace: String,
        name: String,
    },

    #[error("{resource} {name} already exists in namespace {namespace}")]
    AlreadyExists {
        resource: &'static str,
        namespace: String,
        name: String,
    },

    #[error("cluster API call failed: {0}")]
    Backend(String),
}

impl ClusterError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists { .. })
    }
}

/// Errors raised by the session lifecycle state machine.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("session {0} not found")]
    NotFound(String),

    #[error("session {0} already exists")]
    AlreadyExists(String),

    #[error("cluster rejected the request: {0}")]
    Cluster(#[from] ClusterError),

    #[error("partial delete failure for session {id}: {errors:?}")]
    PartialDelete { id: String, errors: Vec<String> },
}

/// Top-level error type composing every subsystem's error enum.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Naming(#[from] NameError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
