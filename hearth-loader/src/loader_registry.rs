use crate::resource_loader::ResourceLoader;
use hearth_base::hashing::HashMap;
use hearth_base::{ResourceError, ResourceResult, ResourceTypeId};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LoaderId(u32);

/// Routes a resource path to the loader registered for its extension. Exactly one loader may
/// claim a given type.
#[derive(Default)]
pub struct LoaderRegistry {
    next_loader_id: u32,
    loaders: HashMap<LoaderId, Arc<dyn ResourceLoader>>,
    type_to_loader: HashMap<ResourceTypeId, LoaderId>,
}

impl LoaderRegistry {
    /// Panics if any of the loader's types is already claimed. Nothing is registered in that case.
    pub fn register(
        &mut self,
        loader: Arc<dyn ResourceLoader>,
    ) -> LoaderId {
        let types: Vec<_> = loader
            .loadable_types()
            .iter()
            .map(|extension| ResourceTypeId::from_extension(extension))
            .collect();

        for type_id in &types {
            if let Some(existing) = self.type_to_loader.get(type_id) {
                let existing_name = self
                    .loaders
                    .get(existing)
                    .map(|x| x.type_name())
                    .unwrap_or("<unknown>");
                panic!(
                    "Resource type {} is already handled by {}, cannot register {}",
                    type_id,
                    existing_name,
                    loader.type_name()
                );
            }
        }

        self.next_loader_id += 1;
        let loader_id = LoaderId(self.next_loader_id);
        log::info!(
            "Register loader {} for types {:?}",
            loader.type_name(),
            loader.loadable_types()
        );
        for type_id in types {
            self.type_to_loader.insert(type_id, loader_id);
        }
        self.loaders.insert(loader_id, loader);
        loader_id
    }

    /// Removes the loader and every type it claimed. Requests already holding the loader keep it
    /// alive until they finish.
    pub fn unregister(
        &mut self,
        loader_id: LoaderId,
    ) -> Option<Arc<dyn ResourceLoader>> {
        let loader = self.loaders.remove(&loader_id)?;
        self.type_to_loader.retain(|_, x| *x != loader_id);
        log::info!("Unregister loader {}", loader.type_name());
        Some(loader)
    }

    pub fn resolve(
        &self,
        path: &str,
    ) -> ResourceResult<Arc<dyn ResourceLoader>> {
        ResourceTypeId::from_path(path)
            .and_then(|type_id| self.type_to_loader.get(&type_id))
            .and_then(|loader_id| self.loaders.get(loader_id))
            .cloned()
            .ok_or_else(|| ResourceError::NoLoader(path.to_string()))
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resource_loader::{InstallDependencies, InstallStatus, LoadedResource, Resource};

    struct NamedLoader {
        types: &'static [&'static str],
    }

    impl ResourceLoader for NamedLoader {
        fn loadable_types(&self) -> &[&'static str] {
            self.types
        }

        fn load(
            &self,
            _bytes: &[u8],
            path: &str,
        ) -> ResourceResult<LoadedResource> {
            Err(ResourceError::parse_error(path, "not used"))
        }

        fn install(
            &self,
            _resource: &mut dyn Resource,
            _dependencies: &InstallDependencies,
        ) -> ResourceResult<InstallStatus> {
            Ok(InstallStatus::Complete)
        }
    }

    #[test]
    fn resolve_by_extension() {
        let mut registry = LoaderRegistry::default();
        let mesh_loader: Arc<dyn ResourceLoader> = Arc::new(NamedLoader {
            types: &["mesh", "skinnedmesh"],
        });
        registry.register(mesh_loader.clone());

        let resolved = registry.resolve("meshes/cube.mesh").unwrap();
        assert!(Arc::ptr_eq(&resolved, &mesh_loader));
        assert!(registry.resolve("meshes/CUBE.SKINNEDMESH").is_ok());

        match registry.resolve("textures/brick.texture") {
            Err(ResourceError::NoLoader(path)) => assert_eq!(path, "textures/brick.texture"),
            _ => panic!("expected NoLoader"),
        }
        assert!(registry.resolve("no_extension").is_err());
    }

    #[test]
    fn unregister_releases_types() {
        let mut registry = LoaderRegistry::default();
        let id = registry.register(Arc::new(NamedLoader { types: &["mesh"] }));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(id).is_some());
        assert!(registry.unregister(id).is_none());
        assert!(registry.is_empty());
        assert!(registry.resolve("a.mesh").is_err());

        // The type can be claimed again once released
        registry.register(Arc::new(NamedLoader { types: &["mesh"] }));
        assert!(registry.resolve("a.mesh").is_ok());
    }

    #[test]
    #[should_panic]
    fn duplicate_type_panics() {
        let mut registry = LoaderRegistry::default();
        registry.register(Arc::new(NamedLoader { types: &["mesh"] }));
        registry.register(Arc::new(NamedLoader {
            types: &["texture", "mesh"],
        }));
    }
}
