//! Raw storage media images: the parent's bytes, unchanged.

use std::sync::Arc;

use crate::helpers::require_parent;
use crate::{Context, FileIo, FileObject, ParentRequirement, PathSpec, ResolverHelper, TypeIndicator, VfsError};

/// Pass-through over a parent layer.
#[derive(Debug)]
pub struct RawFile {
    parent: FileObject,
}

impl RawFile {
    /// Expose `parent` as it is.
    pub fn new(parent: FileObject) -> Self {
        Self { parent }
    }
}

impl FileIo for RawFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
        self.parent.read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        self.parent.size()
    }
}

/// Opens `RAW` layers. Raw images have no file system of their own.
#[derive(Debug, Default)]
pub struct RawResolverHelper;

impl ResolverHelper for RawResolverHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::RAW
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
        Ok(Arc::new(RawFile::new(require_parent(path_spec, parent)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_io::MemoryIo;

    #[test]
    fn passes_bytes_through() {
        let parent = FileObject::detached(PathSpec::os("/m"), Arc::new(MemoryIo(b"raw image".to_vec())));
        let raw = RawFile::new(parent);
        let mut buf = [0u8; 5];
        assert_eq!(raw.read_at(4, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"image");
        assert_eq!(raw.size(), 9);
    }

    #[test]
    fn has_no_file_system() {
        assert!(!RawResolverHelper.supports_file_system());
    }
}
