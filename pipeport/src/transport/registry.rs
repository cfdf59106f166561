use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use super::{RemoteCall, Tag, TransportError};

/// A registry that holds all operations meant to be invoked through remote
/// calls, indexed by tag.
#[derive(Default)]
pub struct RemoteCallRegistry(HashMap<Tag, RemoteCall>);

impl RemoteCallRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a remote call to the registry.
    ///
    /// If the specified tag is already in use, the registry is left unchanged
    /// and an error is returned.
    pub fn add(&mut self, tag: Tag, call: RemoteCall) -> Result<(), TransportError> {
        match self.0.entry(tag) {
            Entry::Vacant(s) => {
                s.insert(call);

                Ok(())
            }
            Entry::Occupied(_) => Err(TransportError::TagInUse(tag)),
        }
    }

    /// Removes the remote call bound to the specified tag.
    pub fn remove(&mut self, tag: Tag) -> Result<RemoteCall, TransportError> {
        self.0.remove(&tag).ok_or(TransportError::UnknownTag(tag))
    }

    /// Returns a handle to the remote call bound to the specified tag.
    ///
    /// The handle is cloned so that the call can be made without holding a
    /// borrow of the registry.
    pub fn get(&self, tag: Tag) -> Option<RemoteCall> {
        self.0.get(&tag).cloned()
    }

    /// Returns all bound tags in increasing order.
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.0.keys().copied().collect();
        tags.sort_unstable();

        tags
    }

    /// Returns the number of bound remote calls.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RemoteCallRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RemoteCallRegistry ({} remote calls)", self.0.len())
    }
}
