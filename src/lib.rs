pub mod error;
pub mod header;
pub mod offsets;
pub mod codec;
pub mod crypto;
pub mod pipeline;
pub mod trailer;
pub mod container;

pub use error::{ErrorKind, PlankError, Result};
pub use header::{Flags, Header};
pub use offsets::{OffsetPair, OffsetTable};
pub use crypto::ContainerKey;
pub use trailer::Trailer;
pub use container::{
    decode, encode, encode_parts, encode_with_rng, inspect, ContainerInfo, DecodeOptions, Decoded,
    EncodeOptions, Encoded, Entry,
};
