//! Compressed streams, decoded into memory when opened.

use std::sync::Arc;

use crate::file_io::MemoryIo;
use crate::helpers::require_parent;
use crate::{Context, FileIo, FileObject, ParentRequirement, PathSpec, ResolverHelper, TypeIndicator, VfsError};

/// Name of the Zstandard compression method.
pub const ZSTD: &str = "zstd";

/// Decode a whole `zstd` stream.
///
/// # Errors
///
/// - [`VfsError::Io`] if the stream is corrupt or reading the parent fails
pub fn decompress_zstd(mut parent: FileObject) -> Result<Vec<u8>, VfsError> {
    zstd::stream::decode_all(&mut parent)
        .map_err(|e| VfsError::io(TypeIndicator::COMPRESSED_STREAM, "decompress", e))
}

/// Opens `COMPRESSED_STREAM` layers.
///
/// The parent is read once, decoded, and released; reads are served from
/// the decoded buffer.
#[derive(Debug, Default)]
pub struct CompressedStreamResolverHelper;

impl ResolverHelper for CompressedStreamResolverHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::COMPRESSED_STREAM
    }

    fn parent_requirement(&self) -> ParentRequirement {
        ParentRequirement::Required
    }

    fn new_file_object(
        &self,
        _context: &Context,
        path_spec: &PathSpec,
        parent: Option<FileObject>,
    ) -> Result<Arc<dyn FileIo>, VfsError> {
        let method = path_spec.text_attribute("compression_method").ok_or_else(|| {
            VfsError::path_spec(TypeIndicator::COMPRESSED_STREAM, "missing compression_method")
        })?;
        if method != ZSTD {
            return Err(VfsError::not_supported(
                TypeIndicator::COMPRESSED_STREAM,
                format!("compression method {method}"),
            ));
        }

        let data = decompress_zstd(require_parent(path_spec, parent)?)?;
        Ok(Arc::new(MemoryIo(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(data: Vec<u8>) -> FileObject {
        FileObject::detached(PathSpec::os("/z"), Arc::new(MemoryIo(data)))
    }

    #[test]
    fn decodes_stream() {
        let plain = b"compressible ".repeat(64);
        let compressed = zstd::stream::encode_all(&plain[..], 3).unwrap();
        assert_eq!(decompress_zstd(detached(compressed)).unwrap(), plain);
    }

    #[test]
    fn corrupt_stream_is_io_error() {
        let err = decompress_zstd(detached(b"definitely not zstd".to_vec())).unwrap_err();
        assert!(matches!(err, VfsError::Io { .. }));
    }
}
