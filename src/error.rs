//! Error type shared by every stage of the container codec.
//!
//! Lower-level concerns keep their own error enums ([`CryptoError`],
//! [`CodecError`]) and are folded into [`PlankError`] at the pipeline
//! boundary, where each failure is classified into one [`ErrorKind`].

use thiserror::Error;

use crate::codec::CodecError;
use crate::crypto::CryptoError;

pub type Result<T> = std::result::Result<T, PlankError>;

/// Coarse classification of a [`PlankError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Argument,
    Authentication,
    Integrity,
    CryptoInit,
}

#[derive(Error, Debug)]
pub enum PlankError {
    /// Bad magic, truncated buffer, misaligned offset table, corrupt trailer.
    #[error("Invalid container format: {0}")]
    Format(String),

    /// Caller supplied inconsistent or missing arguments.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// AEAD tag check failed: wrong key or tampered payload.
    #[error("Authentication failed for entry {entry}")]
    Authentication { entry: String },

    #[error("Hash mismatch for {entry}: expected {expected}, got {actual}")]
    Integrity {
        entry:    String,
        expected: String,
        actual:   String,
    },

    #[error("Cipher initialisation failed: {0}")]
    CryptoInit(String),
}

impl PlankError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlankError::Format(_)              => ErrorKind::Format,
            PlankError::Argument(_)            => ErrorKind::Argument,
            PlankError::Authentication { .. }  => ErrorKind::Authentication,
            PlankError::Integrity { .. }       => ErrorKind::Integrity,
            PlankError::CryptoInit(_)          => ErrorKind::CryptoInit,
        }
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        PlankError::Format(msg.into())
    }

    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        PlankError::Argument(msg.into())
    }

    /// Attach an entry label to a crypto failure.
    pub(crate) fn from_crypto(err: CryptoError, entry: &str) -> Self {
        match err {
            CryptoError::InvalidKey(msg) => PlankError::Argument(msg),
            CryptoError::CipherInit      => PlankError::CryptoInit(err.to_string()),
            CryptoError::EncryptionFailed => PlankError::CryptoInit(err.to_string()),
            CryptoError::DecryptionFailed | CryptoError::TooShort => {
                PlankError::Authentication { entry: entry.to_owned() }
            }
        }
    }

    /// Attach an entry label to a codec failure.
    pub(crate) fn from_codec(err: CodecError, entry: &str) -> Self {
        PlankError::Format(format!("{entry}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_errors_are_classified() {
        let auth = PlankError::from_crypto(CryptoError::DecryptionFailed, "a.txt");
        assert_eq!(auth.kind(), ErrorKind::Authentication);
        assert!(auth.to_string().contains("a.txt"));

        let short = PlankError::from_crypto(CryptoError::TooShort, "#0");
        assert_eq!(short.kind(), ErrorKind::Authentication);

        let key = PlankError::from_crypto(CryptoError::InvalidKey("bad".into()), "#0");
        assert_eq!(key.kind(), ErrorKind::Argument);

        let init = PlankError::from_crypto(CryptoError::CipherInit, "#0");
        assert_eq!(init.kind(), ErrorKind::CryptoInit);
    }

    #[test]
    fn codec_errors_are_format_errors() {
        let err = PlankError::from_codec(CodecError::Decompression("bad frame".into()), "b.txt");
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("b.txt"));
    }
}
