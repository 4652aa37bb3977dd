//! Reference-counted cache of opened objects, keyed by path specification
//! identity.
//!
//! Per identity the cache moves through
//! `absent → Resolving → Resolved(references ≥ 1) → absent`. A failed open
//! goes straight back to `absent`.
//!
//! The map lock is never held while an object is being opened, so opening
//! may recurse into the cache for parent layers. Threads that ask for an
//! identity another thread is resolving wait on a condition variable; the
//! resolving thread itself asking again is a cycle and is rejected.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::{TypeIndicator, VfsError};

enum Slot<T: ?Sized> {
    Resolving {
        owner: ThreadId,
    },
    Resolved {
        object: Arc<T>,
        references: usize,
        generation: u64,
    },
}

/// One counted reference handed out by [`ObjectCache::acquire`].
pub(crate) struct Lease<T: ?Sized> {
    pub(crate) object: Arc<T>,
    pub(crate) generation: u64,
}

pub(crate) struct ObjectCache<T: ?Sized> {
    label: &'static str,
    limit: usize,
    slots: Mutex<HashMap<String, Slot<T>>>,
    ready: Condvar,
    next_generation: AtomicU64,
}

impl<T: ?Sized> ObjectCache<T> {
    pub(crate) fn new(label: &'static str, limit: usize) -> Self {
        Self {
            label,
            limit,
            slots: Mutex::new(HashMap::new()),
            ready: Condvar::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Take a reference to the object cached under `key`, opening it with
    /// `open` if it is not cached yet.
    pub(crate) fn acquire<F>(
        &self,
        key: &str,
        type_indicator: &TypeIndicator,
        open: F,
    ) -> Result<Lease<T>, VfsError>
    where
        F: FnOnce() -> Result<Arc<T>, VfsError>,
    {
        let current = thread::current().id();
        {
            let mut slots = self.slots.lock();
            loop {
                let resolving_owner = match slots.get_mut(key) {
                    Some(Slot::Resolved {
                        object,
                        references,
                        generation,
                    }) => {
                        *references += 1;
                        trace!(
                            %type_indicator,
                            references = *references,
                            "{} cache hit",
                            self.label
                        );
                        return Ok(Lease {
                            object: Arc::clone(object),
                            generation: *generation,
                        });
                    }
                    Some(Slot::Resolving { owner }) => Some(*owner),
                    None => None,
                };

                match resolving_owner {
                    Some(owner) if owner == current => {
                        return Err(VfsError::path_spec(
                            type_indicator.clone(),
                            "cyclic path specification: layer is already being resolved",
                        ));
                    }
                    Some(_) => self.ready.wait(&mut slots),
                    None => break,
                }
            }

            if slots.len() >= self.limit {
                return Err(VfsError::CacheFull {
                    type_indicator: type_indicator.clone(),
                    limit: self.limit,
                });
            }
            slots.insert(key.to_owned(), Slot::Resolving { owner: current });
        }

        let opened = open();

        let mut slots = self.slots.lock();
        let result = match opened {
            Ok(object) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                slots.insert(
                    key.to_owned(),
                    Slot::Resolved {
                        object: Arc::clone(&object),
                        references: 1,
                        generation,
                    },
                );
                debug!(%type_indicator, "{} cached", self.label);
                Ok(Lease { object, generation })
            }
            Err(error) => {
                slots.remove(key);
                Err(error)
            }
        };
        drop(slots);
        self.ready.notify_all();
        result
    }

    /// Give back one reference. The object is removed at zero and dropped
    /// after the lock is released, since dropping it may release parents.
    pub(crate) fn release(&self, key: &str, generation: u64, type_indicator: &TypeIndicator) {
        let removed = {
            let mut slots = self.slots.lock();
            let remaining = match slots.get_mut(key) {
                Some(Slot::Resolved {
                    references,
                    generation: current,
                    ..
                }) if *current == generation => {
                    *references -= 1;
                    Some(*references)
                }
                _ => None,
            };
            match remaining {
                Some(0) => slots.remove(key),
                Some(references) => {
                    trace!(%type_indicator, references, "{} released", self.label);
                    None
                }
                None => None,
            }
        };

        if removed.is_some() {
            debug!(%type_indicator, "{} closed", self.label);
        }
        drop(removed);
    }

    /// Reference count of a resolved object.
    pub(crate) fn references(&self, key: &str) -> Option<usize> {
        match self.slots.lock().get(key) {
            Some(Slot::Resolved { references, .. }) => Some(*references),
            _ => None,
        }
    }

    /// Number of resolved objects.
    pub(crate) fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Resolved { .. }))
            .count()
    }

    /// Drop every resolved slot. Outstanding handles keep their objects and
    /// their later releases are ignored.
    pub(crate) fn clear(&self) {
        let removed: Vec<Slot<T>> = {
            let mut slots = self.slots.lock();
            let keys: Vec<String> = slots
                .iter()
                .filter(|(_, slot)| matches!(slot, Slot::Resolved { .. }))
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter().filter_map(|key| slots.remove(key)).collect()
        };
        drop(removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ObjectCache<str> {
        ObjectCache::new("test object", 2)
    }

    fn open(value: &'static str) -> impl FnOnce() -> Result<Arc<str>, VfsError> {
        move || Ok(Arc::from(value))
    }

    #[test]
    fn second_acquire_shares_object() {
        let cache = cache();
        let first = cache.acquire("a", &TypeIndicator::RAW, open("one")).unwrap();
        let second = cache
            .acquire("a", &TypeIndicator::RAW, || panic!("opened twice"))
            .unwrap();

        assert!(Arc::ptr_eq(&first.object, &second.object));
        assert_eq!(cache.references("a"), Some(2));
    }

    #[test]
    fn release_counts_down_then_removes() {
        let cache = cache();
        let lease = cache.acquire("a", &TypeIndicator::RAW, open("one")).unwrap();
        cache.acquire("a", &TypeIndicator::RAW, open("one")).unwrap();

        cache.release("a", lease.generation, &TypeIndicator::RAW);
        assert_eq!(cache.references("a"), Some(1));
        cache.release("a", lease.generation, &TypeIndicator::RAW);
        assert_eq!(cache.references("a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn failed_open_leaves_no_slot() {
        let cache = cache();
        let err = cache
            .acquire("a", &TypeIndicator::RAW, || {
                Err(VfsError::configuration("boom"))
            })
            .err()
            .unwrap();
        assert!(matches!(err, VfsError::Configuration { .. }));
        assert_eq!(cache.len(), 0);
        cache.acquire("a", &TypeIndicator::RAW, open("one")).unwrap();
    }

    #[test]
    fn reentrant_acquire_is_cycle() {
        let cache = cache();
        let err = cache
            .acquire("a", &TypeIndicator::RAW, || {
                cache
                    .acquire("a", &TypeIndicator::RAW, open("inner"))
                    .map(|lease| lease.object)
            })
            .err()
            .unwrap();
        assert!(matches!(err, VfsError::PathSpec { .. }));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn limit_enforced() {
        let cache = cache();
        cache.acquire("a", &TypeIndicator::RAW, open("a")).unwrap();
        cache.acquire("b", &TypeIndicator::RAW, open("b")).unwrap();
        let err = cache
            .acquire("c", &TypeIndicator::RAW, open("c"))
            .err()
            .unwrap();
        assert!(matches!(err, VfsError::CacheFull { limit: 2, .. }));
    }

    #[test]
    fn stale_release_after_clear_is_ignored() {
        let cache = cache();
        let old = cache.acquire("a", &TypeIndicator::RAW, open("old")).unwrap();
        cache.clear();
        cache.acquire("a", &TypeIndicator::RAW, open("new")).unwrap();

        cache.release("a", old.generation, &TypeIndicator::RAW);
        assert_eq!(cache.references("a"), Some(1));
    }
}
