//! Container encoder and decoder: the primary embedding surface.
//!
//! ```no_run
//! use plank::container::{decode, encode, DecodeOptions, EncodeOptions, Entry};
//!
//! let entries = vec![Entry::named("a.txt", "hello"), Entry::named("b.txt", "world!")];
//! let encoded = encode(&entries, &EncodeOptions { encrypt: true, ..Default::default() })?;
//!
//! let key = encoded.key_hex();
//! let decoded = decode(&encoded.buffer, &DecodeOptions { key, verify: true })?;
//! assert_eq!(decoded.payloads[0], b"hello");
//! # Ok::<(), plank::PlankError>(())
//! ```
//!
//! Every call builds its own state; nothing is shared between calls.

use std::io;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::codec::{CodecId, DEFAULT_COMPRESSION_LEVEL};
use crate::crypto::{ContainerKey, EntryCipher};
use crate::error::{PlankError, Result};
use crate::header::{Flags, Header};
use crate::offsets::{OffsetPair, OffsetTable};
use crate::pipeline::EntryPipeline;
use crate::trailer::Trailer;

// ── Entry ─────────────────────────────────────────────────────────────────────

/// One blob to pack, with an optional name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: Option<String>,
    pub data: Vec<u8>,
}

impl Entry {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { name: None, data: data.into() }
    }

    pub fn named(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self { name: Some(name.into()), data: data.into() }
    }
}

// ── Options ───────────────────────────────────────────────────────────────────

/// Configuration for [`encode`].
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Seal every entry with AES-256-GCM under a fresh container key.
    pub encrypt:  bool,
    /// Zstd-compress every stored payload.
    pub compress: bool,
    /// Zstd level; only used when `compress` is set.
    pub level:    i32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            encrypt:  false,
            compress: false,
            level:    DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Configuration for [`decode`].
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Hex container key; required when the container is encrypted.
    pub key:    Option<String>,
    /// Recompute every plaintext hash and compare it with the trailer.
    pub verify: bool,
}

// ── Results ───────────────────────────────────────────────────────────────────

/// Output of [`encode`].
#[derive(Debug, Clone)]
pub struct Encoded {
    pub buffer: Vec<u8>,
    /// Present only when encryption was requested.  It is not stored in
    /// `buffer` and cannot be recovered from it.
    pub key:    Option<ContainerKey>,
    pub hashes: Vec<String>,
}

impl Encoded {
    pub fn key_hex(&self) -> Option<String> {
        self.key.as_ref().map(ContainerKey::to_hex)
    }
}

/// Output of [`decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub payloads:  Vec<Vec<u8>>,
    pub filenames: Option<Vec<String>>,
    pub hashes:    Vec<String>,
}

impl Decoded {
    pub fn into_entries(self) -> Vec<Entry> {
        let names = self.filenames.map(|n| n.into_iter().map(Some).collect::<Vec<_>>());
        let names = names.unwrap_or_else(|| vec![None; self.payloads.len()]);
        names
            .into_iter()
            .zip(self.payloads)
            .map(|(name, data)| Entry { name, data })
            .collect()
    }
}

/// Structural view of a container, produced by [`inspect`].
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub flags:       Flags,
    pub offsets:     OffsetTable,
    pub trailer:     Trailer,
    pub trailer_len: usize,
}

impl ContainerInfo {
    pub fn entry_count(&self) -> usize {
        self.offsets.len()
    }

    /// Stored (post-transform) payload sizes.
    pub fn stored_sizes(&self) -> Vec<u64> {
        self.offsets.pairs().iter().map(OffsetPair::len).collect()
    }
}

// ── Encode ────────────────────────────────────────────────────────────────────

/// Pack `entries` into a new container buffer.
///
/// Filenames are all-or-nothing: either every entry is named or none is.
pub fn encode(entries: &[Entry], options: &EncodeOptions) -> Result<Encoded> {
    encode_with_rng(entries, options, &mut OsRng)
}

/// [`encode`] with a caller-chosen randomness source for the key and nonces.
pub fn encode_with_rng<R: RngCore + CryptoRng>(
    entries: &[Entry],
    options: &EncodeOptions,
    rng:     &mut R,
) -> Result<Encoded> {
    let named: Vec<String> = entries.iter().filter_map(|e| e.name.clone()).collect();
    if !named.is_empty() && named.len() != entries.len() {
        return Err(PlankError::argument(format!(
            "filenames are all-or-nothing: {} of {} entries are named",
            named.len(),
            entries.len()
        )));
    }
    let filenames = if named.is_empty() { None } else { Some(named) };
    let data: Vec<&[u8]> = entries.iter().map(|e| e.data.as_slice()).collect();
    encode_parts_with_rng(&data, filenames.as_deref(), options, rng)
}

/// Pack parallel lists of payloads and (optionally) filenames.
///
/// Fails with [`PlankError::Argument`] when `filenames` is given and its
/// length differs from `data`.
pub fn encode_parts<D: AsRef<[u8]>>(
    data:      &[D],
    filenames: Option<&[String]>,
    options:   &EncodeOptions,
) -> Result<Encoded> {
    encode_parts_with_rng(data, filenames, options, &mut OsRng)
}

pub fn encode_parts_with_rng<D: AsRef<[u8]>, R: RngCore + CryptoRng>(
    data:      &[D],
    filenames: Option<&[String]>,
    options:   &EncodeOptions,
    rng:       &mut R,
) -> Result<Encoded> {
    if let Some(names) = filenames {
        if names.len() != data.len() {
            return Err(PlankError::argument(format!(
                "must have an equal number of entries and filenames ({} entries, {} filenames)",
                data.len(),
                names.len()
            )));
        }
    }

    let key = if options.encrypt { Some(ContainerKey::generate(rng)) } else { None };
    let cipher = key
        .as_ref()
        .map(EntryCipher::new)
        .transpose()
        .map_err(|e| PlankError::from_crypto(e, "container"))?;
    let pipeline = EntryPipeline::new(cipher, CodecId::for_flag(options.compress), options.level);

    let mut payloads = Vec::with_capacity(data.len());
    let mut hashes = Vec::with_capacity(data.len());
    for (index, item) in data.iter().enumerate() {
        let label = entry_label(index, filenames);
        let encoded = pipeline.encode(&label, item.as_ref(), rng)?;
        hashes.push(encoded.hash);
        payloads.push(encoded.payload);
    }

    let sizes: Vec<u64> = payloads.iter().map(|p| p.len() as u64).collect();
    let offsets = OffsetTable::from_sizes(&sizes);

    let mut flags = Flags::empty();
    flags.set(Flags::FILENAMES, filenames.is_some());
    flags.set(Flags::ENCRYPTED, options.encrypt);
    flags.set(Flags::COMPRESSED, options.compress);

    let trailer = Trailer {
        filenames: filenames.map(<[String]>::to_vec),
        hashes:    hashes.clone(),
    }
    .to_bytes()?;

    debug!(
        entries = data.len(),
        flags = flags.bits(),
        payload_bytes = offsets.data_end() - offsets.data_start(),
        trailer_bytes = trailer.len(),
        "encoding container"
    );
    log_offsets(&offsets);

    let mut buffer = Vec::with_capacity(offsets.data_end() as usize + trailer.len());
    layout_write(Header::new(flags).write(&mut buffer))?;
    layout_write(offsets.write(&mut buffer))?;
    for payload in &payloads {
        buffer.extend_from_slice(payload);
    }
    buffer.extend_from_slice(&trailer);

    Ok(Encoded { buffer, key, hashes })
}

// ── Decode ────────────────────────────────────────────────────────────────────

/// Reconstruct every entry from a container buffer.
///
/// An encrypted container without a key fails with
/// [`PlankError::Argument`] before any cipher is constructed.
pub fn decode(buffer: &[u8], options: &DecodeOptions) -> Result<Decoded> {
    let header = Header::parse(buffer)?;
    let flags = header.flags;
    debug!(
        has_filenames = flags.has_filenames(),
        encrypted = flags.is_encrypted(),
        compressed = flags.is_compressed(),
        "read header"
    );

    let cipher = resolve_cipher(flags, options.key.as_deref())?;
    let offsets = OffsetTable::parse(buffer)?;
    log_offsets(&offsets);
    let trailer = read_trailer(buffer, &offsets, flags)?;

    let pipeline = EntryPipeline::new(
        cipher,
        CodecId::for_flag(flags.is_compressed()),
        DEFAULT_COMPRESSION_LEVEL,
    );
    let names = trailer.filenames.as_deref();

    let mut payloads = Vec::with_capacity(offsets.len());
    for (index, pair) in offsets.pairs().iter().enumerate() {
        let label = entry_label(index, names);
        let expected = options.verify.then(|| trailer.hashes[index].as_str());
        payloads.push(pipeline.decode(&label, &buffer[pair.range()], expected)?);
    }

    Ok(Decoded {
        payloads,
        filenames: trailer.filenames,
        hashes:    trailer.hashes,
    })
}

/// Parse header, offset table and trailer without touching payloads.
pub fn inspect(buffer: &[u8]) -> Result<ContainerInfo> {
    let header = Header::parse(buffer)?;
    let offsets = OffsetTable::parse(buffer)?;
    let trailer = read_trailer(buffer, &offsets, header.flags)?;
    let trailer_len = buffer.len() - offsets.data_end() as usize;
    Ok(ContainerInfo { flags: header.flags, offsets, trailer, trailer_len })
}

// ── helpers ───────────────────────────────────────────────────────────────────

fn resolve_cipher(flags: Flags, key: Option<&str>) -> Result<Option<EntryCipher>> {
    if !flags.is_encrypted() {
        if key.is_some() {
            debug!("container is not encrypted, ignoring supplied key");
        }
        return Ok(None);
    }
    let hex = key.ok_or_else(|| PlankError::argument("the container is encrypted, a key is required"))?;
    let key = ContainerKey::from_hex(hex).map_err(|e| PlankError::from_crypto(e, "container"))?;
    let cipher = EntryCipher::new(&key).map_err(|e| PlankError::from_crypto(e, "container"))?;
    Ok(Some(cipher))
}

/// The trailer occupies everything after the last payload byte.
fn read_trailer(buffer: &[u8], offsets: &OffsetTable, flags: Flags) -> Result<Trailer> {
    let start = offsets.data_end() as usize;
    let trailer = Trailer::from_bytes(&buffer[start..])?;
    trailer.validate(offsets.len(), flags.has_filenames())?;
    Ok(trailer)
}

fn entry_label(index: usize, names: Option<&[String]>) -> String {
    match names.and_then(|n| n.get(index)) {
        Some(name) => name.clone(),
        None       => format!("entry #{index}"),
    }
}

fn log_offsets(offsets: &OffsetTable) {
    for (index, pair) in offsets.pairs().iter().enumerate() {
        debug!(index, start = pair.start, end = pair.end, "offset pair");
    }
}

fn layout_write(res: io::Result<()>) -> Result<()> {
    res.map_err(|e| PlankError::format(format!("failed to write container layout: {e}")))
}
