use crate::pool::FixedPool;
use crate::record::ResourceRecord;
use hearth_base::hashing::HashMap;
use hearth_base::{ResourceError, ResourceId, ResourceResult};
use std::sync::Arc;

/// Maps resource paths to handles and owns the record for every handle. Handles come from a
/// fixed-size pool; the handle for a record is its slot index + 1 so that 0 stays null.
pub struct ResourceRegistry {
    records: FixedPool<ResourceRecord>,
    path_to_id: HashMap<Arc<str>, ResourceId>,
}

impl ResourceRegistry {
    pub fn new(capacity: usize) -> Self {
        ResourceRegistry {
            records: FixedPool::new(capacity),
            path_to_id: Default::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.capacity()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(
        &self,
        path: &str,
    ) -> Option<ResourceId> {
        self.path_to_id.get(path).copied()
    }

    /// Returns the handle already registered for the path, or allocates a handle and a fresh
    /// record. The second value is true if the record was created by this call. Running out of
    /// handles is a configuration error, the capacity is expected to be sized for the worst case.
    pub fn get_or_create(
        &mut self,
        path: &str,
    ) -> ResourceResult<(ResourceId, bool)> {
        if let Some(id) = self.find(path) {
            return Ok((id, false));
        }

        let path: Arc<str> = Arc::from(path);

        // The record needs its own id, which is only known once a slot is picked. Reserve the
        // slot with a placeholder record, then fix the id up.
        let index = self
            .records
            .allocate(ResourceRecord::new(ResourceId::null(), path.clone()))
            .map_err(|_| ResourceError::PoolExhausted {
                capacity: self.records.capacity(),
            })?;
        let id = ResourceId::from_slot_index(index);
        if let Some(record) = self.records.get_mut(index) {
            *record = ResourceRecord::new(id, path.clone());
        }

        log::debug!("Allocate resource handle {} for {}", id, path);
        self.path_to_id.insert(path, id);
        Ok((id, true))
    }

    pub fn get(
        &self,
        id: ResourceId,
    ) -> Option<&ResourceRecord> {
        self.records.get(id.slot_index()?)
    }

    pub fn get_mut(
        &mut self,
        id: ResourceId,
    ) -> Option<&mut ResourceRecord> {
        self.records.get_mut(id.slot_index()?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records.iter().map(|(_, record)| record)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::LoadState;

    #[test]
    fn same_path_same_handle() {
        let mut registry = ResourceRegistry::new(8);
        let (a, created_a) = registry.get_or_create("meshes/a.mesh").unwrap();
        let (a_again, created_again) = registry.get_or_create("meshes/a.mesh").unwrap();
        assert!(created_a);
        assert!(!created_again);
        assert_eq!(a, a_again);
        assert_eq!(registry.len(), 1);

        let (b, _) = registry.get_or_create("meshes/b.mesh").unwrap();
        assert_ne!(a, b);
        assert!(!a.is_null());
        assert!(!b.is_null());
    }

    #[test]
    fn records_know_their_own_id() {
        let mut registry = ResourceRegistry::new(8);
        let (a, _) = registry.get_or_create("a.mesh").unwrap();
        let (b, _) = registry.get_or_create("b.mesh").unwrap();

        let record = registry.get(b).unwrap();
        assert_eq!(record.id(), b);
        assert_eq!(record.path(), "b.mesh");
        assert_eq!(record.load_state(), LoadState::Pending);
        assert!(record.dependencies().is_empty());
        assert!(record.users().is_empty());

        assert_eq!(registry.find("a.mesh"), Some(a));
        assert_eq!(registry.find("c.mesh"), None);
        assert!(registry.get(ResourceId::null()).is_none());
    }

    #[test]
    fn exhausting_the_pool_is_an_error() {
        let mut registry = ResourceRegistry::new(2);
        registry.get_or_create("a.mesh").unwrap();
        registry.get_or_create("b.mesh").unwrap();

        let error = registry.get_or_create("c.mesh").unwrap_err();
        assert!(error.is_configuration_error());
        match error {
            ResourceError::PoolExhausted { capacity } => assert_eq!(capacity, 2),
            _ => panic!("expected PoolExhausted"),
        }

        // Existing paths still resolve when the pool is full
        assert!(registry.get_or_create("a.mesh").is_ok());
        assert!(registry.find("c.mesh").is_none());
    }
}
