mod config;
pub use config::{ResourceSystemConfig, ResourceSystemConfigJson, MAX_LOADED_RESOURCES_LIMIT};

mod file_system;
pub use file_system::{DiskFileSystem, MemoryFileSystem, ResourceFileSystem};

mod loader_registry;
pub use loader_registry::{LoaderId, LoaderRegistry};

pub mod pool;

mod record;
pub use record::{LoadState, ResourceRecord};

mod registry;
pub use registry::ResourceRegistry;

mod resource_loader;
pub use resource_loader::{
    CompiledLoader, CompiledResourceLoader, InstallDependencies, InstallStatus, LoadedResource,
    Resource, ResourceLoader,
};

mod resource_system;
pub use resource_system::{ResourceSystem, ResourceSystemStats};

mod scheduler;
pub use scheduler::{InlineScheduler, Task, TaskHandle, TaskScheduler, ThreadPoolScheduler};

mod streaming_job;

pub use hearth_base::{ResourceError, ResourceId, ResourceResult, ResourceTypeId};

// Request lifecycle:
//
// Pending -> Loading -> Loaded -> WaitingForDependencies -> Installing -> Ready
//
// Pending: record exists, request queued on the main thread
// Loading: owned by the streaming job (read + parse on a worker)
// Loaded: parsed, dependency paths not resolved to handles yet
// WaitingForDependencies: carried from tick to tick until every dependency is Ready
// Installing: install() returned InProgress, poll_install() is called every tick
// Ready: installed, get_resource() is allowed
//
// Any stage can end in Failed. A waiting resource whose dependency failed fails too.
//
// Handles are never reclaimed yet. Unloading will need the users list on each record to reach
// zero before the handle goes back to the pool.
