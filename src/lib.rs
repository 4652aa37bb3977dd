//! # stackvfs
//!
//! Path specification resolution and layered, read-only file I/O for data
//! nested inside storage containers.
//!
//! A disk image inside an encrypted volume inside a virtual disk is addressed
//! by one value, a [`PathSpec`] chain, and opened as if it were a plain file.
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stackvfs::{Attributes, PathSpec, Resolver, TypeIndicator};
//!
//! let resolver = Resolver::with_builtin();
//!
//! // OS file → raw image → 4 KiB window at offset 1 MiB
//! let os = PathSpec::os("/cases/image.raw");
//! let raw = PathSpec::new(TypeIndicator::RAW, Some(os), Attributes::new())?;
//! let window = PathSpec::new(
//!     TypeIndicator::DATA_RANGE,
//!     Some(raw),
//!     [("range_offset", 1_048_576u64), ("range_size", 4096u64)],
//! )?;
//!
//! let mut file = resolver.open_file_object(&window)?;
//! let boot_sector = file.read(512)?;
//! # Ok::<(), stackvfs::VfsError>(())
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`PathSpec`] | One layer of a chain: type, attributes, parent |
//! | [`Factory`] | Builds and deserializes chains by type indicator |
//! | [`ResolverHelperRegistry`] | Maps type indicators to [`ResolverHelper`]s |
//! | [`KeyChain`] | Secrets for encrypted layers |
//! | [`Resolver`] / [`Context`] | Opens chains through a reference-counted cache |
//! | [`FileObject`] | Cursor handle on an opened layer |
//! | [`FileIo`] / [`FileSystem`] | What a helper produces for a layer |
//! | [`DecodeEngine`] | External decoder for a container or volume format |
//! | [`VfsError`] | Error type naming the failing layer |
//!
//! ---
//!
//! ## Resolution
//!
//! ```text
//! open_file_object(spec)
//!   ├─ helper for spec.type_indicator        (NotSupported if none)
//!   ├─ parent requirement vs. spec.parent    (PathSpec error)
//!   └─ cache slot for spec ──hit──▶ new handle, refcount + 1
//!        └─miss──▶ open_file_object(spec.parent)   (recursive, same cache)
//!                  helper.new_file_object(context, spec, parent handle)
//!                  insert with refcount 1 ──▶ new handle
//! ```
//!
//! Each distinct chain is opened once per [`Context`]. Handles release their
//! reference on drop; the object, and with it the references it holds on its
//! parents, goes away with the last handle.
//!
//! ---
//!
//! ## Error Handling
//!
//! All fallible operations return `Result<T, VfsError>`. Errors carry the
//! type indicator of the layer that failed:
//!
//! ```rust
//! use stackvfs::{PathSpec, Resolver, VfsError};
//!
//! let resolver = Resolver::with_builtin();
//! let mut spec = PathSpec::os("/tmp/image.raw");
//! spec.set_parent(Some(PathSpec::os("/tmp")));
//!
//! let err = resolver.open_file_object(&spec).unwrap_err();
//! assert!(matches!(err, VfsError::PathSpec { .. }));
//! assert_eq!(err.to_string(), "OS: path specification error: unexpected parent path specification");
//! ```
//!
//! ---
//!
//! ## Thread Safety
//!
//! Every registry, the key chain and [`Context`] are `Send + Sync` and take
//! `&self`. Concurrent requests for one chain wait for the single in-flight
//! open instead of opening it twice.
//!
//! ---
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and installs no subscriber. Path
//! specifications are logged through their `Display` form, which masks
//! credential attributes.

// Private modules
mod config;
mod error;
mod file_io;
mod file_system;
mod formats;
mod helpers;
mod keychain;
mod path;
mod resolver;
mod types;

#[cfg(test)]
mod testing;

// Public re-exports - errors and configuration
pub use config::ContextConfig;
pub use error::VfsError;

// Public re-exports - core types
pub use types::{
    AttributeValue, Attributes, CREDENTIAL_ATTRIBUTES, CredentialValue, ParentRequirement, TypeIndicator,
    is_credential_attribute,
};

// Public re-exports - path specifications
pub use path::{AttributeRule, AttributeType, Chain, Factory, LayerKind, PathSpec, PathSpecKind};

// Public re-exports - credentials
pub use keychain::{CredentialPrecedence, Credentials, KeyChain};

// Public re-exports - resolution
pub use helpers::{ResolverHelper, ResolverHelperRegistry, require_parent};
pub use resolver::{Context, Resolver};

// Public re-exports - I/O
pub use file_io::{FileIo, FileObject};
pub use file_system::{FileSystem, FileSystemHandle};

// Public re-exports - formats
pub use formats::{
    CompressedStreamResolverHelper, DataRangeFile, DataRangeResolverHelper, DecodeEngine, EncryptedStreamFile,
    EncryptedStreamResolverHelper, EngineResolverHelper, OsFile, OsFileSystem, OsResolverHelper, RawFile,
    RawResolverHelper, SHA256_CTR, ZSTD, apply_sha256_ctr, decompress_zstd,
};
