use crate::registry::ResourceRegistry;
use downcast_rs::Downcast;
use hearth_base::{
    CompiledResourceReader, ResourceError, ResourceHeader, ResourceId, ResourceResult,
    ResourceTypeId,
};
use serde::de::DeserializeOwned;

// Used to dynamic dispatch into a parsed resource object, supports checked downcasting
pub trait Resource: Downcast + Send {}

downcast_rs::impl_downcast!(Resource);

/// Output of `ResourceLoader::load`. Dependencies are paths in the order the resource will ask for
/// them at install time. They are not resolved to handles yet.
pub struct LoadedResource {
    pub resource: Box<dyn Resource>,
    pub dependencies: Vec<String>,
}

impl LoadedResource {
    pub fn new<T: Resource>(resource: T) -> Self {
        LoadedResource {
            resource: Box::new(resource),
            dependencies: Vec::default(),
        }
    }

    pub fn with_dependencies(
        mut self,
        dependencies: Vec<String>,
    ) -> Self {
        self.dependencies = dependencies;
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InstallStatus {
    Complete,
    // Install has started but needs more frames. The loader will be polled once per tick.
    InProgress,
}

/// Parses and installs every resource type it claims. One loader per type, shared between the
/// main thread (install) and the streaming worker (load).
pub trait ResourceLoader: Send + Sync {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// File extensions (lower-case, without the dot) this loader handles
    fn loadable_types(&self) -> &[&'static str];

    /// Parse bytes into a resource object. Runs on a worker thread and must not touch the device.
    fn load(
        &self,
        bytes: &[u8],
        path: &str,
    ) -> ResourceResult<LoadedResource>;

    /// Create device state. Only called once every dependency is ready.
    fn install(
        &self,
        resource: &mut dyn Resource,
        dependencies: &InstallDependencies,
    ) -> ResourceResult<InstallStatus>;

    /// Called once per tick after `install` returned `InProgress`, until it returns `Complete`
    /// or an error
    fn poll_install(
        &self,
        _resource: &mut dyn Resource,
        _dependencies: &InstallDependencies,
    ) -> ResourceResult<InstallStatus> {
        Ok(InstallStatus::Complete)
    }

    fn uninstall(
        &self,
        _resource: &mut dyn Resource,
    ) {
    }

    fn unload(
        &self,
        resource: Box<dyn Resource>,
    ) {
        std::mem::drop(resource);
    }
}

/// What a loader sees of its dependencies during install: the resolved handles, indexed in the
/// order the dependency paths were declared.
pub struct InstallDependencies<'a> {
    resource_path: &'a str,
    dependencies: &'a [ResourceId],
    registry: &'a ResourceRegistry,
}

impl<'a> InstallDependencies<'a> {
    pub(crate) fn new(
        resource_path: &'a str,
        dependencies: &'a [ResourceId],
        registry: &'a ResourceRegistry,
    ) -> Self {
        InstallDependencies {
            resource_path,
            dependencies,
            registry,
        }
    }

    /// Path of the resource being installed
    pub fn resource_path(&self) -> &'a str {
        self.resource_path
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn handles(&self) -> &'a [ResourceId] {
        self.dependencies
    }

    pub fn handle(
        &self,
        index: usize,
    ) -> Option<ResourceId> {
        self.dependencies.get(index).copied()
    }

    pub fn path(
        &self,
        index: usize,
    ) -> Option<&'a str> {
        let record = self.registry.get(self.handle(index)?)?;
        Some(record.path())
    }

    /// Dependency #index as a resource of type T. None if the index is out of range, the
    /// dependency is not ready, or it is of a different type.
    pub fn get<T: Resource>(
        &self,
        index: usize,
    ) -> Option<&'a T> {
        let record = self.registry.get(self.handle(index)?)?;
        if !record.is_ready() {
            return None;
        }

        record.resource.as_deref()?.downcast_ref::<T>()
    }

    /// Like `get`, but produces an install error naming the resource and the missing dependency
    pub fn require<T: Resource>(
        &self,
        index: usize,
    ) -> ResourceResult<&'a T> {
        self.get::<T>(index).ok_or_else(|| {
            ResourceError::install_error(
                self.resource_path,
                format!(
                    "dependency #{} ({}) is not a ready {}",
                    index,
                    self.path(index).unwrap_or("<out of range>"),
                    std::any::type_name::<T>()
                ),
            )
        })
    }
}

/// Loader for resources baked into the compiled resource envelope. The header is decoded and
/// checked by the adapter, implementations only see the typed payload.
pub trait CompiledResourceLoader: Send + Sync + 'static {
    type Payload: DeserializeOwned;
    type Resource: Resource;

    fn loadable_types(&self) -> &[&'static str];

    fn create(
        &self,
        header: &ResourceHeader,
        payload: Self::Payload,
    ) -> ResourceResult<Self::Resource>;

    fn install(
        &self,
        resource: &mut Self::Resource,
        dependencies: &InstallDependencies,
    ) -> ResourceResult<InstallStatus>;

    fn poll_install(
        &self,
        _resource: &mut Self::Resource,
        _dependencies: &InstallDependencies,
    ) -> ResourceResult<InstallStatus> {
        Ok(InstallStatus::Complete)
    }

    fn uninstall(
        &self,
        _resource: &mut Self::Resource,
    ) {
    }
}

/// Adapts a `CompiledResourceLoader` to the dynamic `ResourceLoader` interface
pub struct CompiledLoader<L: CompiledResourceLoader>(pub L);

impl<L: CompiledResourceLoader> CompiledLoader<L> {
    pub fn new(loader: L) -> Self {
        CompiledLoader(loader)
    }

    pub fn inner(&self) -> &L {
        &self.0
    }

    fn downcast<'r>(
        resource: &'r mut dyn Resource,
        path: &str,
    ) -> ResourceResult<&'r mut L::Resource> {
        resource.downcast_mut::<L::Resource>().ok_or_else(|| {
            ResourceError::install_error(
                path,
                format!(
                    "resource object is not a {}",
                    std::any::type_name::<L::Resource>()
                ),
            )
        })
    }
}

impl<L: CompiledResourceLoader> ResourceLoader for CompiledLoader<L> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<L>()
    }

    fn loadable_types(&self) -> &[&'static str] {
        self.0.loadable_types()
    }

    fn load(
        &self,
        bytes: &[u8],
        path: &str,
    ) -> ResourceResult<LoadedResource> {
        profiling::scope!("CompiledLoader::load");
        let reader =
            CompiledResourceReader::new(bytes).map_err(|e| ResourceError::parse_error(path, e))?;

        let header = reader.header();
        let expected_type = ResourceTypeId::from_path(path);
        if expected_type != Some(ResourceTypeId::from_extension(&header.type_tag)) {
            return Err(ResourceError::parse_error(
                path,
                format!("header declares type {}", header.type_tag),
            ));
        }

        if header.path != path {
            return Err(ResourceError::parse_error(
                path,
                format!("header declares path {}", header.path),
            ));
        }

        let payload = reader
            .payload::<L::Payload>()
            .map_err(|e| ResourceError::parse_error(path, e))?;
        let resource = self.0.create(header, payload)?;
        let dependencies = reader.into_header().dependencies;

        Ok(LoadedResource::new(resource).with_dependencies(dependencies))
    }

    fn install(
        &self,
        resource: &mut dyn Resource,
        dependencies: &InstallDependencies,
    ) -> ResourceResult<InstallStatus> {
        let resource = Self::downcast(resource, dependencies.resource_path())?;
        self.0.install(resource, dependencies)
    }

    fn poll_install(
        &self,
        resource: &mut dyn Resource,
        dependencies: &InstallDependencies,
    ) -> ResourceResult<InstallStatus> {
        let resource = Self::downcast(resource, dependencies.resource_path())?;
        self.0.poll_install(resource, dependencies)
    }

    fn uninstall(
        &self,
        resource: &mut dyn Resource,
    ) {
        if let Some(resource) = resource.downcast_mut::<L::Resource>() {
            self.0.uninstall(resource);
        }
    }
}
