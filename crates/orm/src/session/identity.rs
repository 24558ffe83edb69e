//! Per-session identity cache

use std::any::TypeId;
use std::collections::HashMap;

use crate::metadata::{AnyRef, IdentityKey};

/// Maps (entity type, primary key) to the one live instance of that row
#[derive(Default)]
pub(crate) struct IdentityCache {
    entries: HashMap<(TypeId, IdentityKey), AnyRef>,
}

impl IdentityCache {
    pub(crate) fn get(&self, type_id: TypeId, key: &IdentityKey) -> Option<AnyRef> {
        self.entries.get(&(type_id, key.clone())).cloned()
    }

    pub(crate) fn insert(&mut self, type_id: TypeId, key: IdentityKey, instance: AnyRef) {
        self.entries.insert((type_id, key), instance);
    }

    pub(crate) fn remove(&mut self, type_id: TypeId, key: &IdentityKey) -> Option<AnyRef> {
        self.entries.remove(&(type_id, key.clone()))
    }

    pub(crate) fn contains(&self, type_id: TypeId, key: &IdentityKey) -> bool {
        self.entries.contains_key(&(type_id, key.clone()))
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
