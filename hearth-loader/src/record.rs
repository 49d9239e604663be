use crate::resource_loader::Resource;
use crate::resource_system::RequestKey;
use hearth_base::{ResourceError, ResourceId};
use std::sync::Arc;

/// Where a resource is in its lifecycle. A resource with no record is unknown to the system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LoadState {
    // Registered and queued, not yet handed to the streaming job
    Pending,
    // Being read and parsed (by the streaming job, or inline by the blocking path)
    Loading,
    // Parsed, dependency paths not resolved yet
    Loaded,
    // Dependencies resolved to handles, waiting for all of them to be ready
    WaitingForDependencies,
    // Install was called and reported that it is still in progress
    Installing,
    // Installed, safe to use
    Ready,
    // Read, parse, dependency resolution or install failed. Terminal.
    Failed,
}

/// Bookkeeping for a single resource. Owned by the resource system, callers only ever see shared
/// borrows of it.
pub struct ResourceRecord {
    id: ResourceId,
    path: Arc<str>,
    pub(crate) load_state: LoadState,
    // The parsed resource object, None until Load completes
    pub(crate) resource: Option<Box<dyn Resource>>,
    // Handles of resources this one requires, in the order its header declared them
    pub(crate) dependencies: Vec<ResourceId>,
    // Handles of resources that require this one
    pub(crate) users: Vec<ResourceId>,
    // Number of times this resource was explicitly requested via the public load APIs
    pub(crate) external_request_count: u32,
    // The in-flight request, if the streaming pipeline is still working on this resource
    pub(crate) request: Option<RequestKey>,
    pub(crate) error: Option<ResourceError>,
}

impl ResourceRecord {
    pub(crate) fn new(
        id: ResourceId,
        path: Arc<str>,
    ) -> Self {
        ResourceRecord {
            id,
            path,
            load_state: LoadState::Pending,
            resource: None,
            dependencies: Vec::default(),
            users: Vec::default(),
            external_request_count: 0,
            request: None,
            error: None,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn shared_path(&self) -> &Arc<str> {
        &self.path
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn is_ready(&self) -> bool {
        self.load_state == LoadState::Ready
    }

    pub fn is_failed(&self) -> bool {
        self.load_state == LoadState::Failed
    }

    pub fn dependencies(&self) -> &[ResourceId] {
        &self.dependencies
    }

    pub fn users(&self) -> &[ResourceId] {
        &self.users
    }

    pub fn external_request_count(&self) -> u32 {
        self.external_request_count
    }

    /// The error that moved this resource to `LoadState::Failed`
    pub fn error(&self) -> Option<&ResourceError> {
        self.error.as_ref()
    }

    pub fn resource(&self) -> Option<&dyn Resource> {
        self.resource.as_deref()
    }
}

impl std::fmt::Debug for ResourceRecord {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ResourceRecord")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("load_state", &self.load_state)
            .field("has_resource", &self.resource.is_some())
            .field("dependencies", &self.dependencies)
            .field("users", &self.users)
            .field("external_request_count", &self.external_request_count)
            .finish()
    }
}
