//! Streams encrypted with a symmetric keystream.
//!
//! The only method is `sha256-ctr`: keystream block `i` is
//! `SHA-256(key || initialization_vector || i)` with `i` as a little-endian
//! `u64`, XORed with the parent's bytes. Encryption and decryption are the
//! same operation.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::helpers::require_parent;
use crate::{
    Context, CredentialPrecedence, FileIo, FileObject, ParentRequirement, PathSpec, ResolverHelper,
    TypeIndicator, VfsError,
};

/// Name of the SHA-256 counter mode keystream method.
pub const SHA256_CTR: &str = "sha256-ctr";

const BLOCK_SIZE: u64 = 32;

/// XOR `data`, located at `offset` in the stream, with the `sha256-ctr`
/// keystream.
///
/// # Example
///
/// ```rust
/// use stackvfs::apply_sha256_ctr;
///
/// let mut data = b"attack at dawn".to_vec();
/// apply_sha256_ctr(b"key", b"iv", 0, &mut data);
/// assert_ne!(data, b"attack at dawn");
/// apply_sha256_ctr(b"key", b"iv", 0, &mut data);
/// assert_eq!(data, b"attack at dawn");
/// ```
pub fn apply_sha256_ctr(key: &[u8], initialization_vector: &[u8], offset: u64, data: &mut [u8]) {
    let mut position = offset;
    let mut remaining = data;
    while !remaining.is_empty() {
        let counter = position / BLOCK_SIZE;
        let skip = (position % BLOCK_SIZE) as usize;

        let block = Sha256::new()
            .chain_update(key)
            .chain_update(initialization_vector)
            .chain_update(counter.to_le_bytes())
            .finalize();

        let keystream = &block[skip..];
        let n = keystream.len().min(remaining.len());
        let (chunk, rest) = std::mem::take(&mut remaining).split_at_mut(n);
        for (byte, key_byte) in chunk.iter_mut().zip(keystream) {
            *byte ^= key_byte;
        }
        remaining = rest;
        position += n as u64;
    }
}

/// Decrypting view over a parent layer.
pub struct EncryptedStreamFile {
    parent: FileObject,
    key: Vec<u8>,
    initialization_vector: Vec<u8>,
}

impl EncryptedStreamFile {
    /// Decrypt `parent` with the `sha256-ctr` keystream.
    pub fn new(parent: FileObject, key: Vec<u8>, initialization_vector: Vec<u8>) -> Self {
        Self {
            parent,
            key,
            initialization_vector,
        }
    }
}

impl FileIo for EncryptedStreamFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
        let n = self.parent.read_at(offset, buf)?;
        apply_sha256_ctr(&self.key, &self.initialization_vector, offset, &mut buf[..n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.parent.size()
    }
}

impl std::fmt::Debug for EncryptedStreamFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedStreamFile")
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

/// Opens `ENCRYPTED_STREAM` layers.
///
/// The `key` and `initialization_vector` credentials are taken from the path
/// specification first, then from the context's key chain.
#[derive(Debug, Default)]
pub struct EncryptedStreamResolverHelper;

impl EncryptedStreamResolverHelper {
    const PRECEDENCE: CredentialPrecedence = CredentialPrecedence::PathSpecFirst;
}

impl ResolverHelper for EncryptedStreamResolverHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::ENCRYPTED_STREAM
    }

    fn parent_requirement(&self) -> ParentRequirement {
        ParentRequirement::Required
    }

    fn new_file_object(
        &self,
        context: &Context,
        path_spec: &PathSpec,
        parent: Option<FileObject>,
    ) -> Result<Arc<dyn FileIo>, VfsError> {
        let method = path_spec.text_attribute("encryption_method").ok_or_else(|| {
            VfsError::path_spec(TypeIndicator::ENCRYPTED_STREAM, "missing encryption_method")
        })?;
        if method != SHA256_CTR {
            return Err(VfsError::not_supported(
                TypeIndicator::ENCRYPTED_STREAM,
                format!("encryption method {method}"),
            ));
        }

        let key_chain = context.key_chain();
        let key = key_chain
            .resolve_credential(path_spec, "key", Self::PRECEDENCE)
            .ok_or_else(|| VfsError::credential(TypeIndicator::ENCRYPTED_STREAM, "missing key"))?;
        let initialization_vector = key_chain
            .resolve_credential(path_spec, "initialization_vector", Self::PRECEDENCE)
            .map(|value| value.as_bytes().to_vec())
            .unwrap_or_default();

        let parent = require_parent(path_spec, parent)?;
        Ok(Arc::new(EncryptedStreamFile::new(
            parent,
            key.as_bytes().to_vec(),
            initialization_vector,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_io::MemoryIo;

    #[test]
    fn keystream_is_position_dependent() {
        let mut whole = vec![0u8; 100];
        apply_sha256_ctr(b"k", b"", 0, &mut whole);

        let mut tail = vec![0u8; 60];
        apply_sha256_ctr(b"k", b"", 40, &mut tail);
        assert_eq!(&whole[40..], &tail[..]);
        assert_ne!(&whole[..32], &whole[32..64]);
    }

    #[test]
    fn initialization_vector_changes_keystream() {
        let mut a = vec![0u8; 16];
        let mut b = vec![0u8; 16];
        apply_sha256_ctr(b"k", b"one", 0, &mut a);
        apply_sha256_ctr(b"k", b"two", 0, &mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn file_decrypts_at_any_offset() {
        let plain = b"the quick brown fox jumps over the lazy dog, twice over".to_vec();
        let mut cipher = plain.clone();
        apply_sha256_ctr(b"secret", b"iv", 0, &mut cipher);

        let parent = FileObject::detached(PathSpec::os("/e"), Arc::new(MemoryIo(cipher)));
        let file = EncryptedStreamFile::new(parent, b"secret".to_vec(), b"iv".to_vec());

        let mut buf = [0u8; 9];
        assert_eq!(file.read_at(35, &mut buf).unwrap(), 9);
        assert_eq!(&buf, &plain[35..44]);
    }

    #[test]
    fn debug_hides_key() {
        let parent = FileObject::detached(PathSpec::os("/e"), Arc::new(MemoryIo(Vec::new())));
        let file = EncryptedStreamFile::new(parent, b"hunter2".to_vec(), Vec::new());
        assert!(!format!("{file:?}").contains("hunter2"));
    }
}
