use serde::{Deserialize, Serialize};

use crate::codec::{Codec, ZstdCodec, DEFAULT_COMPRESSION_LEVEL};
use crate::error::{PlankError, Result};

/// Length of a hex-encoded sha256 digest.
pub const HASH_HEX_LEN: usize = 64;

/// Metadata appended after the last payload: names and plaintext hashes,
/// both parallel to the entries.  Stored as zstd-compressed JSON with no
/// length prefix; it runs to the end of the buffer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Trailer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filenames: Option<Vec<String>>,
    pub hashes:    Vec<String>,
}

impl Trailer {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)
            .map_err(|e| PlankError::format(format!("trailer serialisation: {e}")))?;
        ZstdCodec
            .compress(&json, DEFAULT_COMPRESSION_LEVEL)
            .map_err(|e| PlankError::from_codec(e, "trailer"))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(PlankError::format("trailer is missing"));
        }
        let json = ZstdCodec
            .decompress(bytes)
            .map_err(|e| PlankError::from_codec(e, "trailer"))?;
        serde_json::from_slice(&json)
            .map_err(|e| PlankError::format(format!("corrupt trailer: {e}")))
    }

    /// Check the trailer against the entry count and filename flag read
    /// from the header and offset table.
    pub fn validate(&self, entries: usize, has_filenames: bool) -> Result<()> {
        if self.hashes.len() != entries {
            return Err(PlankError::format(format!(
                "trailer lists {} hashes for {entries} entries",
                self.hashes.len()
            )));
        }
        match (&self.filenames, has_filenames) {
            (Some(names), true) if names.len() != entries => {
                return Err(PlankError::format(format!(
                    "trailer lists {} filenames for {entries} entries",
                    names.len()
                )));
            }
            (None, true) => return Err(PlankError::format("filename flag set but trailer has no filenames")),
            (Some(_), false) => return Err(PlankError::format("trailer has filenames but the flag is clear")),
            _ => {}
        }
        if let Some(bad) = self.hashes.iter().find(|h| !is_hex_digest(h)) {
            return Err(PlankError::format(format!("malformed hash in trailer: {bad:?}")));
        }
        Ok(())
    }
}

fn is_hex_digest(s: &str) -> bool {
    s.len() == HASH_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const H: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn json_shape() {
        let trailer = Trailer { filenames: None, hashes: vec![H.into()] };
        let json = ZstdCodec.decompress(&trailer.to_bytes().unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert!(value.get("filenames").is_none());
        assert_eq!(value["hashes"][0], H);
    }

    #[test]
    fn bytes_roundtrip_with_names() {
        let trailer = Trailer {
            filenames: Some(vec!["a.txt".into()]),
            hashes:    vec![H.into()],
        };
        let back = Trailer::from_bytes(&trailer.to_bytes().unwrap()).unwrap();
        assert_eq!(back, trailer);
        back.validate(1, true).unwrap();
    }

    #[test]
    fn garbage_is_format_error() {
        assert_eq!(Trailer::from_bytes(b"nope").unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(Trailer::from_bytes(b"").unwrap_err().kind(), ErrorKind::Format);

        let not_json = ZstdCodec.compress(b"[1,2", 3).unwrap();
        assert_eq!(Trailer::from_bytes(&not_json).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn validate_counts_and_flag() {
        let trailer = Trailer { filenames: Some(vec!["a".into()]), hashes: vec![H.into()] };
        assert!(trailer.validate(2, true).is_err());
        assert!(trailer.validate(1, false).is_err());

        let unnamed = Trailer { filenames: None, hashes: vec![H.into()] };
        assert!(unnamed.validate(1, true).is_err());
        unnamed.validate(1, false).unwrap();

        let bad_hash = Trailer { filenames: None, hashes: vec!["XYZ".into()] };
        assert_eq!(bad_hash.validate(1, false).unwrap_err().kind(), ErrorKind::Format);
    }
}
