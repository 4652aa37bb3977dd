//! Built-in layer adapters and the decode engine contract.
//!
//! | Type | Adapter | Notes |
//! |------|---------|-------|
//! | `OS` | [`OsFile`], [`OsFileSystem`] | root of every chain |
//! | `RAW` | [`RawFile`] | pass-through |
//! | `DATA_RANGE` | [`DataRangeFile`] | window over the parent |
//! | `ENCRYPTED_STREAM` | [`EncryptedStreamFile`] | `sha256-ctr` keystream |
//! | `COMPRESSED_STREAM` | in-memory buffer | `zstd` |
//! | volumes and containers | [`DecodeEngine`] | registered by the caller |

mod compressed_stream;
mod data_range;
mod encrypted_stream;
mod engine;
mod os;
mod raw;

pub use compressed_stream::{CompressedStreamResolverHelper, ZSTD, decompress_zstd};
pub use data_range::{DataRangeFile, DataRangeResolverHelper};
pub use encrypted_stream::{EncryptedStreamFile, EncryptedStreamResolverHelper, SHA256_CTR, apply_sha256_ctr};
pub use engine::{DecodeEngine, EngineResolverHelper};
pub use os::{OsFile, OsFileSystem, OsResolverHelper};
pub use raw::{RawFile, RawResolverHelper};
