//! Byte-source capability of a layer and the cursor handle callers read through.

use std::io::{self, SeekFrom};
use std::sync::Arc;

use crate::resolver::CacheTicket;
use crate::{PathSpec, TypeIndicator, VfsError};

/// A random-access, read-only byte source produced by a resolver helper.
///
/// Implementations are positional and take `&self`, so one cached source can
/// serve every [`FileObject`] handle opened on it, each with its own cursor.
/// Implementations use interior mutability where the underlying storage
/// needs it.
///
/// # Example
///
/// ```rust
/// use stackvfs::{FileIo, VfsError};
///
/// struct Zeros(u64);
///
/// impl FileIo for Zeros {
///     fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
///         let available = self.0.saturating_sub(offset);
///         let n = buf.len().min(usize::try_from(available).unwrap_or(usize::MAX));
///         buf[..n].fill(0);
///         Ok(n)
///     }
///
///     fn size(&self) -> u64 {
///         self.0
///     }
/// }
///
/// let mut buf = [1u8; 8];
/// assert_eq!(Zeros(4).read_at(2, &mut buf).unwrap(), 2);
/// ```
pub trait FileIo: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read; `0` at or past the end. A short
    /// count before the end is allowed, callers loop.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError>;

    /// Total size in bytes.
    fn size(&self) -> u64;
}

/// An open handle on a layer: a cursor over a shared [`FileIo`].
///
/// Handles returned by a [`Context`](crate::Context) each hold one reference
/// on the cached object. Dropping the handle, or calling
/// [`close`](Self::close), gives that reference back; the object is torn
/// down when its last handle goes away.
///
/// # Example
///
/// ```rust
/// use std::io::SeekFrom;
/// use std::sync::Arc;
/// use stackvfs::{FileIo, FileObject, PathSpec, VfsError};
///
/// struct Bytes(Vec<u8>);
///
/// impl FileIo for Bytes {
///     fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
///         let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.0.len());
///         let n = buf.len().min(self.0.len() - start);
///         buf[..n].copy_from_slice(&self.0[start..start + n]);
///         Ok(n)
///     }
///
///     fn size(&self) -> u64 {
///         self.0.len() as u64
///     }
/// }
///
/// let mut file = FileObject::detached(PathSpec::os("/mem"), Arc::new(Bytes(b"layered".to_vec())));
/// file.seek(SeekFrom::Start(2)).unwrap();
/// assert_eq!(file.read(3).unwrap(), b"yer");
/// assert_eq!(file.read_to_end().unwrap(), b"ed");
/// assert!(file.read(1).unwrap().is_empty());
/// ```
pub struct FileObject {
    io: Arc<dyn FileIo>,
    path_spec: PathSpec,
    offset: u64,
    ticket: Option<CacheTicket>,
}

impl FileObject {
    pub(crate) fn cached(path_spec: PathSpec, io: Arc<dyn FileIo>, ticket: CacheTicket) -> Self {
        Self {
            io,
            path_spec,
            offset: 0,
            ticket: Some(ticket),
        }
    }

    /// A handle that is not tracked by any context.
    ///
    /// Useful for handing an in-memory source to a
    /// [`DecodeEngine`](crate::DecodeEngine) in tests.
    pub fn detached(path_spec: PathSpec, io: Arc<dyn FileIo>) -> Self {
        Self {
            io,
            path_spec,
            offset: 0,
            ticket: None,
        }
    }

    /// The path specification this handle was opened for.
    pub fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    /// The type of the outermost layer.
    pub fn type_indicator(&self) -> &TypeIndicator {
        self.path_spec.type_indicator()
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        self.io.size()
    }

    /// Current cursor position.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns `true` if both handles share the same opened object.
    pub fn same_object(&self, other: &FileObject) -> bool {
        Arc::ptr_eq(&self.io, &other.io)
    }

    /// Fill as much of `buf` as possible from `offset` without moving the
    /// cursor. Returns the number of bytes read, short only at the end.
    ///
    /// # Errors
    ///
    /// - Any error of the underlying layer
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .io
                .read_at(offset.saturating_add(filled as u64), &mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Read up to `size` bytes at the cursor and advance it.
    ///
    /// The result is short at the end of the stream and empty past it.
    ///
    /// # Errors
    ///
    /// - Any error of the underlying layer
    pub fn read(&mut self, size: usize) -> Result<Vec<u8>, VfsError> {
        let remaining = self.size().saturating_sub(self.offset);
        let size = size.min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let mut data = vec![0u8; size];
        let n = self.read_at(self.offset, &mut data)?;
        data.truncate(n);
        self.offset += n as u64;
        Ok(data)
    }

    /// Read everything from the cursor to the end.
    ///
    /// # Errors
    ///
    /// - Any error of the underlying layer
    pub fn read_to_end(&mut self) -> Result<Vec<u8>, VfsError> {
        let remaining = self.size().saturating_sub(self.offset);
        self.read(usize::try_from(remaining).unwrap_or(usize::MAX))
    }

    /// Move the cursor. Positions past the end are allowed and read as empty.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Io`] with [`io::ErrorKind::InvalidInput`] if the new
    ///   position would be negative or overflow
    pub fn seek(&mut self, position: SeekFrom) -> Result<u64, VfsError> {
        let target = match position {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.offset.checked_add_signed(delta),
            SeekFrom::End(delta) => self.size().checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            VfsError::io(
                self.type_indicator().clone(),
                "seek",
                io::Error::new(io::ErrorKind::InvalidInput, "invalid seek to a negative offset"),
            )
        })?;
        self.offset = target;
        Ok(target)
    }

    /// Release this handle.
    pub fn close(self) {
        drop(self);
    }
}

impl io::Read for FileObject {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.io.read_at(self.offset, buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl io::Seek for FileObject {
    fn seek(&mut self, position: SeekFrom) -> io::Result<u64> {
        Ok(FileObject::seek(self, position)?)
    }
}

impl Drop for FileObject {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            ticket.release(self.path_spec.type_indicator());
        }
    }
}

impl std::fmt::Debug for FileObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileObject")
            .field("path_spec", &self.path_spec)
            .field("offset", &self.offset)
            .field("size", &self.io.size())
            .field("cached", &self.ticket.is_some())
            .finish()
    }
}

/// In-memory [`FileIo`] over an owned buffer.
pub(crate) struct MemoryIo(pub(crate) Vec<u8>);

impl FileIo for MemoryIo {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        let Some(available) = self.0.get(start..) else {
            return Ok(0);
        };
        let n = buf.len().min(available.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.0.len() as u64
    }
}
