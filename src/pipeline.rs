//! Per-entry transform pipeline.
//!
//! Encode: sha256(plaintext) → seal (optional) → compress (optional).
//! Decode: decompress (optional) → open (optional) → verify (optional).
//!
//! When both transforms are on, ciphertext is what gets compressed.  That
//! ordering is part of the on-disk format.

use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::codec::{get_codec, CodecError, CodecId};
use crate::crypto::EntryCipher;
use crate::error::{PlankError, Result};

/// Hex sha256 of `data`.
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Output of [`EntryPipeline::encode`].
#[derive(Debug, Clone)]
pub struct EncodedEntry {
    /// Bytes stored in the container.
    pub payload: Vec<u8>,
    /// Hex sha256 of the plaintext.
    pub hash:    String,
}

/// The transforms selected for one container.
pub struct EntryPipeline {
    cipher: Option<EntryCipher>,
    codec:  CodecId,
    level:  i32,
}

impl EntryPipeline {
    pub fn new(cipher: Option<EntryCipher>, codec: CodecId, level: i32) -> Self {
        Self { cipher, codec, level }
    }

    pub fn encode<R: RngCore + CryptoRng>(
        &self,
        label: &str,
        data:  &[u8],
        rng:   &mut R,
    ) -> Result<EncodedEntry> {
        let hash = hash_hex(data);
        trace!(entry = label, sha256 = %hash, size = data.len(), "hashed entry");

        let sealed = match &self.cipher {
            Some(cipher) => cipher
                .seal(data, rng)
                .map_err(|e| PlankError::from_crypto(e, label))?,
            None => data.to_vec(),
        };

        let payload = get_codec(self.codec)
            .compress(&sealed, self.level)
            .map_err(|e| PlankError::from_codec(e, label))?;
        trace!(entry = label, stored = payload.len(), codec = self.codec.name(), "encoded entry");

        Ok(EncodedEntry { payload, hash })
    }

    /// Reverse [`EntryPipeline::encode`].  When `expected_hash` is given
    /// the recovered plaintext must hash to it.
    pub fn decode(
        &self,
        label:         &str,
        payload:       &[u8],
        expected_hash: Option<&str>,
    ) -> Result<Vec<u8>> {
        let unpacked = get_codec(self.codec)
            .decompress(payload)
            .map_err(|e| self.undecodable(e, label, expected_hash))?;

        let plaintext = match &self.cipher {
            Some(cipher) => cipher
                .open(&unpacked)
                .map_err(|e| PlankError::from_crypto(e, label))?,
            None => unpacked,
        };

        if let Some(expected) = expected_hash {
            let actual = hash_hex(&plaintext);
            if actual != expected {
                return Err(PlankError::Integrity {
                    entry:    label.to_owned(),
                    expected: expected.to_owned(),
                    actual,
                });
            }
            trace!(entry = label, "checksum passed");
        }
        Ok(plaintext)
    }

    /// Classify a stored payload that no longer decompresses.  Behind a
    /// cipher it is a failed authentication; under verification it is a
    /// failed integrity check.
    fn undecodable(&self, err: CodecError, label: &str, expected_hash: Option<&str>) -> PlankError {
        match (&self.cipher, expected_hash) {
            (Some(_), _) => PlankError::Authentication { entry: label.to_owned() },
            (None, Some(expected)) => PlankError::Integrity {
                entry:    label.to_owned(),
                expected: expected.to_owned(),
                actual:   format!("undecodable payload ({err})"),
            },
            (None, None) => PlankError::from_codec(err, label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DEFAULT_COMPRESSION_LEVEL;
    use crate::crypto::{ContainerKey, NONCE_LEN, TAG_LEN};
    use crate::error::ErrorKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pipeline(encrypt: bool, compress: bool, rng: &mut StdRng) -> EntryPipeline {
        let cipher = encrypt.then(|| EntryCipher::new(&ContainerKey::generate(rng)).unwrap());
        EntryPipeline::new(cipher, CodecId::for_flag(compress), DEFAULT_COMPRESSION_LEVEL)
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            hash_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn plain_payload_is_verbatim() {
        let mut rng = StdRng::seed_from_u64(0);
        let p = pipeline(false, false, &mut rng);
        let out = p.encode("#0", b"hello", &mut rng).unwrap();
        assert_eq!(out.payload, b"hello");
        assert_eq!(out.hash, hash_hex(b"hello"));
    }

    #[test]
    fn hash_covers_plaintext_not_payload() {
        let mut rng = StdRng::seed_from_u64(3);
        let p = pipeline(true, true, &mut rng);
        let out = p.encode("#0", b"some plaintext", &mut rng).unwrap();
        assert_eq!(out.hash, hash_hex(b"some plaintext"));
        assert_ne!(out.hash, hash_hex(&out.payload));
    }

    #[test]
    fn encrypted_payload_carries_nonce_and_tag() {
        let mut rng = StdRng::seed_from_u64(4);
        let p = pipeline(true, false, &mut rng);
        let out = p.encode("#0", b"12345", &mut rng).unwrap();
        assert_eq!(out.payload.len(), NONCE_LEN + 5 + TAG_LEN);
    }

    #[test]
    fn every_combination_decodes() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        for encrypt in [false, true] {
            for compress in [false, true] {
                let mut rng = StdRng::seed_from_u64(11);
                let p = pipeline(encrypt, compress, &mut rng);
                let out = p.encode("x", &data, &mut rng).unwrap();
                let back = p.decode("x", &out.payload, Some(&out.hash)).unwrap();
                assert_eq!(back, data, "encrypt={encrypt} compress={compress}");
            }
        }
    }

    #[test]
    fn hash_mismatch_is_integrity_error() {
        let mut rng = StdRng::seed_from_u64(5);
        let p = pipeline(false, false, &mut rng);
        let err = p.decode("a.txt", b"hellp", Some(&hash_hex(b"hello"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(err.to_string().contains("a.txt"));

        // Without verification the bytes come back as stored.
        assert_eq!(p.decode("a.txt", b"hellp", None).unwrap(), b"hellp");
    }

    #[test]
    fn broken_frame_behind_cipher_is_authentication_error() {
        let mut rng = StdRng::seed_from_u64(8);
        let p = pipeline(true, true, &mut rng);
        let err = p.decode("a.txt", b"not a zstd frame", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(err.to_string().contains("a.txt"));
    }

    #[test]
    fn broken_frame_under_verification_is_integrity_error() {
        let mut rng = StdRng::seed_from_u64(9);
        let p = pipeline(false, true, &mut rng);
        let expected = hash_hex(b"hello");
        let err = p.decode("b.txt", b"not a zstd frame", Some(&expected)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(err.to_string().contains("b.txt"));

        // Without verification there is no hash to fail, only a bad frame.
        let err = p.decode("b.txt", b"not a zstd frame", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn tampered_ciphertext_is_authentication_error() {
        let mut rng = StdRng::seed_from_u64(6);
        let p = pipeline(true, false, &mut rng);
        let mut out = p.encode("#0", b"payload", &mut rng).unwrap();
        let last = out.payload.len() - 1;
        out.payload[last] ^= 0x01;
        let err = p.decode("#0", &out.payload, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }
}
