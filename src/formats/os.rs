//! Host operating system files: the root of every chain.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    Context, FileIo, FileObject, FileSystem, ParentRequirement, PathSpec, ResolverHelper, TypeIndicator,
    VfsError,
};

fn location(path_spec: &PathSpec) -> Result<&str, VfsError> {
    path_spec
        .text_attribute("location")
        .ok_or_else(|| VfsError::path_spec(TypeIndicator::OS, "missing location"))
}

fn os_io(operation: &'static str, source: io::Error) -> VfsError {
    VfsError::io(TypeIndicator::OS, operation, source)
}

/// A regular file on the host, read positionally.
///
/// The size is taken when the file is opened.
pub struct OsFile {
    file: Mutex<File>,
    size: u64,
}

impl OsFile {
    /// Open a regular file.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Io`] if the file cannot be opened or is not a regular file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VfsError> {
        let file = File::open(path.as_ref()).map_err(|e| os_io("open", e))?;
        let metadata = file.metadata().map_err(|e| os_io("stat", e))?;
        if !metadata.is_file() {
            return Err(os_io(
                "open",
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a regular file: {}", path.as_ref().display()),
                ),
            ));
        }
        Ok(Self {
            file: Mutex::new(file),
            size: metadata.len(),
        })
    }
}

impl FileIo for OsFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
        if offset >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| os_io("seek", e))?;
        loop {
            match file.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(os_io("read", e)),
            }
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// The host file system, addressed by `OS` path specifications.
pub struct OsFileSystem {
    path_spec: PathSpec,
}

impl OsFileSystem {
    /// The host file system as seen from `path_spec`.
    pub fn new(path_spec: PathSpec) -> Self {
        Self { path_spec }
    }
}

impl FileSystem for OsFileSystem {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::OS
    }

    fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    fn path_separator(&self) -> &str {
        std::path::MAIN_SEPARATOR_STR
    }

    fn file_entry_exists(&self, path_spec: &PathSpec) -> Result<bool, VfsError> {
        if path_spec.type_indicator() != &TypeIndicator::OS {
            return Err(VfsError::path_spec(
                path_spec.type_indicator().clone(),
                "not an OS path specification",
            ));
        }
        std::fs::exists(location(path_spec)?).map_err(|e| os_io("exists", e))
    }
}

/// Opens `OS` layers.
#[derive(Debug, Default)]
pub struct OsResolverHelper;

impl ResolverHelper for OsResolverHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::OS
    }

    fn parent_requirement(&self) -> ParentRequirement {
        ParentRequirement::Forbidden
    }

    fn new_file_object(
        &self,
        _context: &Context,
        path_spec: &PathSpec,
        _parent: Option<FileObject>,
    ) -> Result<Arc<dyn FileIo>, VfsError> {
        Ok(Arc::new(OsFile::open(location(path_spec)?)?))
    }

    fn supports_file_system(&self) -> bool {
        true
    }

    fn new_file_system(
        &self,
        _context: &Context,
        path_spec: &PathSpec,
        _parent: Option<FileObject>,
    ) -> Result<Arc<dyn FileSystem>, VfsError> {
        Ok(Arc::new(OsFileSystem::new(path_spec.clone())))
    }
}
