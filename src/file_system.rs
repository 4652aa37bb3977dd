//! Mounted file system capability of a layer.

use std::ops::Deref;
use std::sync::Arc;

use crate::resolver::CacheTicket;
use crate::{PathSpec, TypeIndicator, VfsError};

/// A file system exposed by a layer, such as the host file system for `OS`
/// or a volume decoded by an engine.
///
/// Directory listing and metadata are left to implementations; this trait
/// covers addressing and existence checks only.
pub trait FileSystem: Send + Sync {
    /// The layer type this file system belongs to.
    fn type_indicator(&self) -> TypeIndicator;

    /// The path specification the file system was opened for.
    fn path_spec(&self) -> &PathSpec;

    /// Separator between path segments.
    fn path_separator(&self) -> &str {
        "/"
    }

    /// Returns `true` if the entry addressed by `path_spec` exists.
    ///
    /// # Errors
    ///
    /// - [`VfsError::PathSpec`] if `path_spec` does not address this file system
    /// - [`VfsError::Io`] if the check itself fails
    fn file_entry_exists(&self, path_spec: &PathSpec) -> Result<bool, VfsError>;

    /// Join segments into an absolute path, dropping empty segments and
    /// stray separators.
    fn join_path(&self, segments: &[&str]) -> String {
        let separator = self.path_separator();
        let mut path = String::new();
        for segment in segments
            .iter()
            .flat_map(|segment| segment.split(separator))
            .filter(|segment| !segment.is_empty())
        {
            path.push_str(separator);
            path.push_str(segment);
        }
        if path.is_empty() {
            path.push_str(separator);
        }
        path
    }

    /// Split a path into its non-empty segments.
    fn split_path(&self, path: &str) -> Vec<String> {
        path.split(self.path_separator())
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// An open handle on a cached [`FileSystem`].
///
/// Dereferences to the file system. Dropping the handle, or calling
/// [`close`](Self::close), releases its reference.
pub struct FileSystemHandle {
    file_system: Arc<dyn FileSystem>,
    ticket: Option<CacheTicket>,
}

impl FileSystemHandle {
    pub(crate) fn cached(file_system: Arc<dyn FileSystem>, ticket: CacheTicket) -> Self {
        Self {
            file_system,
            ticket: Some(ticket),
        }
    }

    /// Returns `true` if both handles share the same opened file system.
    pub fn same_object(&self, other: &FileSystemHandle) -> bool {
        Arc::ptr_eq(&self.file_system, &other.file_system)
    }

    /// Release this handle.
    pub fn close(self) {
        drop(self);
    }
}

impl Deref for FileSystemHandle {
    type Target = dyn FileSystem;

    fn deref(&self) -> &Self::Target {
        &*self.file_system
    }
}

impl Drop for FileSystemHandle {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            ticket.release(&self.file_system.type_indicator());
        }
    }
}

impl std::fmt::Debug for FileSystemHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemHandle")
            .field("path_spec", self.file_system.path_spec())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Backslashes(PathSpec);

    impl FileSystem for Backslashes {
        fn type_indicator(&self) -> TypeIndicator {
            TypeIndicator::new("NTFS")
        }

        fn path_spec(&self) -> &PathSpec {
            &self.0
        }

        fn path_separator(&self) -> &str {
            "\\"
        }

        fn file_entry_exists(&self, _path_spec: &PathSpec) -> Result<bool, VfsError> {
            Ok(false)
        }
    }

    struct Slashes(PathSpec);

    impl FileSystem for Slashes {
        fn type_indicator(&self) -> TypeIndicator {
            TypeIndicator::OS
        }

        fn path_spec(&self) -> &PathSpec {
            &self.0
        }

        fn file_entry_exists(&self, _path_spec: &PathSpec) -> Result<bool, VfsError> {
            Ok(true)
        }
    }

    #[test]
    fn join_collapses_separators() {
        let fs = Slashes(PathSpec::os("/"));
        assert_eq!(fs.join_path(&["/a/", "", "b//c", "d"]), "/a/b/c/d");
        assert_eq!(fs.join_path(&[]), "/");
    }

    #[test]
    fn split_skips_empty_segments() {
        let fs = Slashes(PathSpec::os("/"));
        assert_eq!(fs.split_path("//a/b/"), ["a", "b"]);
        assert!(fs.split_path("/").is_empty());
    }

    #[test]
    fn custom_separator() {
        let fs = Backslashes(PathSpec::os("/"));
        assert_eq!(fs.join_path(&["Windows", "System32"]), "\\Windows\\System32");
        assert_eq!(fs.split_path("\\Windows\\System32"), ["Windows", "System32"]);
    }
}
