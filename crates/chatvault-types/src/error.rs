use thiserror::Error;

/// Coarse classification of a [`StoreError`], for branching without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input: empty ids, inverted time range. Never retried.
    Validation,
    /// The session id is unknown.
    NotFound,
    /// A session with the same id already exists.
    Duplicate,
    /// Transient failures persisted past the attempt budget.
    RetriesExhausted,
    /// Cancellation or deadline fired while waiting between attempts.
    Cancelled,
    /// Key size, encoding or authentication failure.
    Crypto,
    /// Any other failure reported by the document store.
    Store,
}

/// Errors from the field-level encryption codec.
///
/// IMPORTANT: these never include plaintext, key material, or ciphertext
/// in their Display/Debug output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid encryption key size: {0} bytes (must be 16, 24, or 32)")]
    InvalidKeySize(usize),

    #[error("failed to create cipher: invalid key size {0}")]
    CipherInit(usize),

    #[error("failed to encrypt")]
    EncryptionFailed,

    #[error("failed to decode base64: {0}")]
    Base64Decode(String),

    #[error("ciphertext too short")]
    CiphertextTooShort,

    #[error("failed to decrypt")]
    DecryptionFailed,

    #[error("decrypted content is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors from session store, query, metrics and index operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session ID cannot be empty")]
    InvalidSessionId,

    #[error("user ID cannot be empty")]
    InvalidUserId,

    #[error("end time must be after start time")]
    InvalidTimeRange,

    #[error("session not found in database")]
    SessionNotFound,

    #[error("session '{0}' already exists")]
    DuplicateSession(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Raw failure reported by the store. Retry classification looks at `message`.
    #[error("{message}")]
    Backend { message: String },

    #[error("failed to decode stored document: {0}")]
    Corrupt(String),

    #[error("operation failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<StoreError>,
    },

    #[error("operation cancelled during retry: {operation}")]
    Cancelled {
        operation: String,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidSessionId
            | StoreError::InvalidUserId
            | StoreError::InvalidTimeRange => ErrorKind::Validation,
            StoreError::SessionNotFound => ErrorKind::NotFound,
            StoreError::DuplicateSession(_) => ErrorKind::Duplicate,
            StoreError::Crypto(_) => ErrorKind::Crypto,
            StoreError::Backend { .. } | StoreError::Corrupt(_) => ErrorKind::Store,
            StoreError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            StoreError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }

    pub fn is_not_found(&self) -> bool {
        self.is(ErrorKind::NotFound)
    }

    pub fn is_validation(&self) -> bool {
        self.is(ErrorKind::Validation)
    }

    /// The last underlying error for retry wrappers, `self` otherwise.
    pub fn root(&self) -> &StoreError {
        match self {
            StoreError::RetriesExhausted { source, .. } | StoreError::Cancelled { source, .. } => {
                source.root()
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_kinds() {
        assert!(StoreError::InvalidSessionId.is_validation());
        assert!(StoreError::InvalidUserId.is_validation());
        assert!(StoreError::InvalidTimeRange.is_validation());
        assert!(StoreError::SessionNotFound.is_not_found());
        assert_eq!(
            StoreError::DuplicateSession("s".to_string()).kind(),
            ErrorKind::Duplicate
        );
        assert_eq!(
            StoreError::Crypto(CryptoError::CiphertextTooShort).kind(),
            ErrorKind::Crypto
        );
        assert_eq!(StoreError::backend("boom").kind(), ErrorKind::Store);
    }

    #[test]
    fn test_retries_exhausted_display_and_root() {
        let err = StoreError::RetriesExhausted {
            attempts: 3,
            source: Box::new(StoreError::backend("connection refused")),
        };
        assert_eq!(
            err.to_string(),
            "operation failed after 3 attempts: connection refused"
        );
        assert!(err.is(ErrorKind::RetriesExhausted));
        assert_eq!(err.root().to_string(), "connection refused");
    }

    #[test]
    fn test_cancelled_display() {
        let err = StoreError::Cancelled {
            operation: "GetSession".to_string(),
            source: Box::new(StoreError::backend("i/o timeout")),
        };
        assert!(err.to_string().starts_with("operation cancelled during retry"));
        assert!(err.is(ErrorKind::Cancelled));
    }

    #[test]
    fn test_crypto_error_display() {
        let err = CryptoError::InvalidKeySize(10);
        assert_eq!(
            err.to_string(),
            "invalid encryption key size: 10 bytes (must be 16, 24, or 32)"
        );
        assert_eq!(CryptoError::CiphertextTooShort.to_string(), "ciphertext too short");
        assert!(CryptoError::DecryptionFailed.to_string().contains("failed to decrypt"));
    }
}
