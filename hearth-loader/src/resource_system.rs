use crate::config::ResourceSystemConfig;
use crate::file_system::{DiskFileSystem, ResourceFileSystem};
use crate::loader_registry::{LoaderId, LoaderRegistry};
use crate::pool::FixedPool;
use crate::record::{LoadState, ResourceRecord};
use crate::registry::ResourceRegistry;
use crate::resource_loader::{
    CompiledLoader, CompiledResourceLoader, InstallDependencies, InstallStatus, Resource,
    ResourceLoader,
};
use crate::scheduler::{TaskScheduler, ThreadPoolScheduler};
use crate::streaming_job::{load_catching_panics, AsyncLoadRequestState, StreamingJob};
use hearth_base::hashing::HashSet;
use hearth_base::{ResourceError, ResourceId, ResourceResult};
use std::sync::Arc;

/// Index of a pending load request in the request pool
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey(usize);

impl RequestKey {
    pub(crate) fn new(index: usize) -> Self {
        RequestKey(index)
    }
}

// Who asked for a resource to be loaded
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Requester {
    // A caller of the public load API
    External,
    // A resource that declared this one as a dependency
    Resource(ResourceId),
}

// Lives from the first request for a path until the resource is ready or failed
struct PendingLoadRequest {
    id: ResourceId,
    path: Arc<str>,
    loader: Arc<dyn ResourceLoader>,
    // Only the first requester is kept, later ones are counted
    first_requester: Requester,
    requester_count: u32,
}

enum DependencyStatus {
    Ready,
    Waiting,
    Failed(String),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResourceSystemStats {
    pub pending: usize,
    pub loading: usize,
    pub loaded: usize,
    pub waiting_for_dependencies: usize,
    pub installing: usize,
    pub ready: usize,
    pub failed: usize,
    pub requests_in_flight: usize,
    pub batch_in_flight: bool,
    pub batches_submitted: u64,
}

/// Drives resources from a path to an installed, ready-to-use object.
///
/// Asynchronous loads are advanced by `tick()`, which is expected to be called once per frame.
/// Each tick:
/// - returns immediately if the previous streaming batch is still running
/// - hands newly requested resources to the streaming job and takes its finished loads
/// - resolves the dependency paths of finished loads to handles, requesting unseen ones
/// - installs every resource whose dependencies are all ready, in arrival order
/// - submits the next streaming batch
///
/// `load_blocking()` runs the same stages inline, recursively loading dependencies first.
pub struct ResourceSystem {
    registry: ResourceRegistry,
    loaders: LoaderRegistry,
    requests: FixedPool<PendingLoadRequest>,
    file_system: Arc<dyn ResourceFileSystem>,
    streaming_job: StreamingJob,

    // Requests created since the last exchange with the streaming job
    submitted: Vec<RequestKey>,
    // Loaded, waiting for all dependencies to be ready. Kept in arrival order.
    waiting_for_dependencies: Vec<RequestKey>,
    // Install reported InProgress, polled every tick
    installing: Vec<RequestKey>,

    tick_index: u64,

    // Declared last so worker threads are joined after everything above is dropped
    scheduler: Box<dyn TaskScheduler>,
}

impl ResourceSystem {
    pub fn new(
        config: &ResourceSystemConfig,
        file_system: Arc<dyn ResourceFileSystem>,
        scheduler: Box<dyn TaskScheduler>,
    ) -> Self {
        log::info!(
            "Create resource system with capacity for {} resources",
            config.max_loaded_resources
        );

        ResourceSystem {
            registry: ResourceRegistry::new(config.max_loaded_resources),
            loaders: LoaderRegistry::default(),
            // There is at most one request per record
            requests: FixedPool::new(config.max_loaded_resources),
            streaming_job: StreamingJob::new(file_system.clone()),
            file_system,
            submitted: Vec::default(),
            waiting_for_dependencies: Vec::default(),
            installing: Vec::default(),
            tick_index: 0,
            scheduler,
        }
    }

    /// Reads from `data_root_path` on disk and streams on a thread pool
    pub fn from_config(config: &ResourceSystemConfig) -> ResourceResult<Self> {
        let file_system = Arc::new(DiskFileSystem::new(config.data_root_path.clone()));
        let scheduler = Box::new(ThreadPoolScheduler::new(config.worker_thread_count)?);
        Ok(Self::new(config, file_system, scheduler))
    }

    //
    // Loaders
    //

    /// Panics if one of the loader's types is already handled by another loader
    pub fn register_loader(
        &mut self,
        loader: Arc<dyn ResourceLoader>,
    ) -> LoaderId {
        self.loaders.register(loader)
    }

    pub fn register_compiled_loader<L: CompiledResourceLoader>(
        &mut self,
        loader: L,
    ) -> LoaderId {
        self.register_loader(Arc::new(CompiledLoader::new(loader)))
    }

    /// Requests already in flight keep using the loader until they finish
    pub fn unregister_loader(
        &mut self,
        loader_id: LoaderId,
    ) -> Option<Arc<dyn ResourceLoader>> {
        self.loaders.unregister(loader_id)
    }

    //
    // Queries
    //

    pub fn handle_for_path(
        &self,
        path: &str,
    ) -> Option<ResourceId> {
        self.registry.find(path)
    }

    pub fn record(
        &self,
        id: ResourceId,
    ) -> Option<&ResourceRecord> {
        self.registry.get(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.registry.iter()
    }

    pub fn load_state(
        &self,
        id: ResourceId,
    ) -> Option<LoadState> {
        self.registry.get(id).map(|x| x.load_state())
    }

    pub fn is_ready(
        &self,
        id: ResourceId,
    ) -> bool {
        self.registry
            .get(id)
            .map(|x| x.is_ready())
            .unwrap_or(false)
    }

    /// None if the resource is not ready or is not a T
    pub fn try_get_resource<T: Resource>(
        &self,
        id: ResourceId,
    ) -> Option<&T> {
        let record = self.registry.get(id)?;
        if !record.is_ready() {
            return None;
        }

        record.resource.as_deref()?.downcast_ref::<T>()
    }

    /// Panics if the resource is not ready or is not a T
    pub fn get_resource<T: Resource>(
        &self,
        id: ResourceId,
    ) -> &T {
        let record = self
            .registry
            .get(id)
            .unwrap_or_else(|| panic!("get_resource called with unknown handle {}", id));
        assert!(
            record.is_ready(),
            "get_resource called on {} which is {:?}, not ready",
            record.path(),
            record.load_state()
        );

        match record.resource.as_deref().and_then(|x| x.downcast_ref::<T>()) {
            Some(resource) => resource,
            None => panic!(
                "get_resource called on {} with the wrong type {}",
                record.path(),
                std::any::type_name::<T>()
            ),
        }
    }

    /// True when nothing is queued, streaming, waiting or installing
    pub fn is_idle(&self) -> bool {
        self.requests.is_empty()
    }

    // Callers and resources waiting on the in-flight request for this resource
    #[cfg(test)]
    pub(crate) fn requester_count(
        &self,
        id: ResourceId,
    ) -> Option<u32> {
        let request_key = self.registry.get(id)?.request?;
        self.requests
            .get(request_key.0)
            .map(|x| x.requester_count)
    }

    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }

    pub fn stats(&self) -> ResourceSystemStats {
        let mut stats = ResourceSystemStats::default();
        for record in self.registry.iter() {
            match record.load_state() {
                LoadState::Pending => stats.pending += 1,
                LoadState::Loading => stats.loading += 1,
                LoadState::Loaded => stats.loaded += 1,
                LoadState::WaitingForDependencies => stats.waiting_for_dependencies += 1,
                LoadState::Installing => stats.installing += 1,
                LoadState::Ready => stats.ready += 1,
                LoadState::Failed => stats.failed += 1,
            }
        }

        stats.requests_in_flight = self.requests.len();
        stats.batch_in_flight = self.streaming_job.has_batch_in_flight();
        stats.batches_submitted = self.streaming_job.batches_submitted();
        stats
    }

    //
    // Asynchronous load
    //

    /// Requests a load and returns the handle immediately. Poll `is_ready()` and call `tick()`
    /// to make progress. Panics on configuration errors (no loader for the type, handle pool
    /// exhausted).
    pub fn load_async(
        &mut self,
        path: &str,
    ) -> ResourceId {
        match self.try_load_async(path) {
            Ok(id) => id,
            Err(e) => {
                log::error!("load_async({}) failed: {}", path, e);
                panic!("load_async({}) failed: {}", path, e);
            }
        }
    }

    pub fn try_load_async(
        &mut self,
        path: &str,
    ) -> ResourceResult<ResourceId> {
        let id = self.request_load(path, Requester::External)?;
        if let Some(record) = self.registry.get_mut(id) {
            record.external_request_count += 1;
        }

        Ok(id)
    }

    // Returns the existing handle if the path is already known, registering the requester on the
    // live request if there is one. Otherwise creates the record and queues a new request.
    fn request_load(
        &mut self,
        path: &str,
        requester: Requester,
    ) -> ResourceResult<ResourceId> {
        if let Some(id) = self.registry.find(path) {
            let request_key = self.registry.get(id).and_then(|x| x.request);
            if let Some(request) = request_key.and_then(|key| self.requests.get_mut(key.0)) {
                log::trace!("{} is already in flight, add requester {:?}", path, requester);
                request.requester_count += 1;
            }

            return Ok(id);
        }

        let loader = self.loaders.resolve(path)?;
        let (id, _) = self.registry.get_or_create(path)?;

        let record = self
            .registry
            .get_mut(id)
            .ok_or_else(|| ResourceError::StringError(format!("record for {} vanished", path)))?;
        let request = PendingLoadRequest {
            id,
            path: record.shared_path().clone(),
            loader,
            first_requester: requester,
            requester_count: 1,
        };

        match self.requests.allocate(request) {
            Ok(index) => {
                record.request = Some(RequestKey(index));
                record.load_state = LoadState::Pending;
                self.submitted.push(RequestKey(index));
                log::debug!("Request load of {} {} by {:?}", id, path, requester);
                Ok(id)
            }
            Err(_) => {
                let error = ResourceError::PoolExhausted {
                    capacity: self.requests.capacity(),
                };
                record.load_state = LoadState::Failed;
                record.error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Advances asynchronous loads. Never blocks on I/O or install work.
    #[profiling::function]
    pub fn tick(&mut self) {
        self.tick_index += 1;

        // One streaming batch at a time. The job owns its queues until the batch completes.
        if self.streaming_job.is_in_flight() {
            return;
        }

        let new_requests = self.take_submitted();
        let loaded = self.streaming_job.exchange(new_requests);
        self.handle_loaded(loaded);

        let installable = self.scan_waiting_for_dependencies();
        self.poll_installing();
        for request_key in installable {
            self.begin_install(request_key);
        }

        // Dependencies discovered this tick go out in the next batch
        let new_requests = self.take_submitted();
        self.streaming_job.submit(new_requests, &*self.scheduler);
    }

    fn take_submitted(&mut self) -> Vec<AsyncLoadRequestState> {
        let mut new_requests = Vec::with_capacity(self.submitted.len());
        for request_key in std::mem::take(&mut self.submitted) {
            let request = match self.requests.get(request_key.0) {
                Some(request) => request,
                None => continue,
            };

            if let Some(record) = self.registry.get_mut(request.id) {
                record.load_state = LoadState::Loading;
            }

            new_requests.push(AsyncLoadRequestState {
                request_key,
                id: request.id,
                path: request.path.clone(),
                loader: request.loader.clone(),
                bytes: Vec::default(),
                output: None,
            });
        }

        new_requests
    }

    fn handle_loaded(
        &mut self,
        loaded: Vec<AsyncLoadRequestState>,
    ) {
        for mut state in loaded {
            let output = state.output.take().unwrap_or_else(|| {
                Err(ResourceError::parse_error(
                    &*state.path,
                    "streaming job produced no output",
                ))
            });

            let loaded_resource = match output {
                Ok(loaded_resource) => loaded_resource,
                Err(e) => {
                    self.fail_request(state.request_key, e);
                    continue;
                }
            };

            match self.registry.get_mut(state.id) {
                Some(record) => {
                    record.resource = Some(loaded_resource.resource);
                    record.load_state = LoadState::Loaded;
                }
                None => continue,
            }
            log::debug!(
                "Loaded {} {} with {} dependencies",
                state.id,
                state.path,
                loaded_resource.dependencies.len()
            );

            match self.resolve_dependencies(state.id, &loaded_resource.dependencies) {
                Ok(()) => {
                    if let Some(record) = self.registry.get_mut(state.id) {
                        record.load_state = LoadState::WaitingForDependencies;
                    }
                    self.waiting_for_dependencies.push(state.request_key);
                }
                Err(e) => self.fail_request(state.request_key, e),
            }
        }
    }

    fn resolve_dependencies(
        &mut self,
        id: ResourceId,
        dependency_paths: &[String],
    ) -> ResourceResult<()> {
        for dependency_path in dependency_paths {
            let dependency = self.request_load(dependency_path, Requester::Resource(id))?;
            if self.depends_on_any(dependency, &[id]) {
                return Err(ResourceError::DependencyCycle(dependency_path.clone()));
            }

            self.add_dependency_edge(id, dependency);
        }

        Ok(())
    }

    fn add_dependency_edge(
        &mut self,
        user: ResourceId,
        dependency: ResourceId,
    ) {
        if let Some(record) = self.registry.get_mut(user) {
            record.dependencies.push(dependency);
        }

        if let Some(record) = self.registry.get_mut(dependency) {
            if !record.users.contains(&user) {
                record.users.push(user);
            }
        }
    }

    // True if `from` is one of `targets` or reaches one of them through dependency edges
    fn depends_on_any(
        &self,
        from: ResourceId,
        targets: &[ResourceId],
    ) -> bool {
        let mut visited = HashSet::default();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if targets.contains(&id) {
                return true;
            }

            if !visited.insert(id) {
                continue;
            }

            if let Some(record) = self.registry.get(id) {
                stack.extend_from_slice(&record.dependencies);
            }
        }

        false
    }

    fn dependency_status(
        &self,
        id: ResourceId,
    ) -> DependencyStatus {
        let record = match self.registry.get(id) {
            Some(record) => record,
            None => return DependencyStatus::Waiting,
        };

        let mut status = DependencyStatus::Ready;
        for dependency in &record.dependencies {
            match self.registry.get(*dependency) {
                Some(x) if x.is_ready() => {}
                Some(x) if x.is_failed() => return DependencyStatus::Failed(x.path().to_string()),
                _ => status = DependencyStatus::Waiting,
            }
        }

        status
    }

    fn scan_waiting_for_dependencies(&mut self) -> Vec<RequestKey> {
        let mut installable = Vec::default();
        for request_key in std::mem::take(&mut self.waiting_for_dependencies) {
            let request = match self.requests.get(request_key.0) {
                Some(request) => request,
                None => continue,
            };

            match self.dependency_status(request.id) {
                DependencyStatus::Ready => installable.push(request_key),
                DependencyStatus::Waiting => self.waiting_for_dependencies.push(request_key),
                DependencyStatus::Failed(dependency) => {
                    let error = ResourceError::DependencyFailed {
                        path: request.path.to_string(),
                        dependency,
                    };
                    self.fail_request(request_key, error);
                }
            }
        }

        installable
    }

    fn begin_install(
        &mut self,
        request_key: RequestKey,
    ) {
        let (id, loader) = match self.requests.get(request_key.0) {
            Some(request) => (request.id, request.loader.clone()),
            None => return,
        };

        let result = self.run_install_step(id, &loader, false);
        self.finish_install_step(request_key, result);
    }

    fn poll_installing(&mut self) {
        for request_key in std::mem::take(&mut self.installing) {
            let (id, loader) = match self.requests.get(request_key.0) {
                Some(request) => (request.id, request.loader.clone()),
                None => continue,
            };

            let result = self.run_install_step(id, &loader, true);
            self.finish_install_step(request_key, result);
        }
    }

    // Calls install (or poll_install) with a view of the record's dependencies. The resource
    // object is taken out of the record for the duration of the call.
    fn run_install_step(
        &mut self,
        id: ResourceId,
        loader: &Arc<dyn ResourceLoader>,
        poll: bool,
    ) -> ResourceResult<InstallStatus> {
        profiling::scope!("run_install_step");
        let record = self
            .registry
            .get_mut(id)
            .ok_or_else(|| ResourceError::StringError(format!("no record for {}", id)))?;
        let mut resource = record.resource.take().ok_or_else(|| {
            ResourceError::install_error(record.path(), "resource object is missing")
        })?;
        record.load_state = LoadState::Installing;

        let result = match self.registry.get(id) {
            Some(record) => {
                let dependencies =
                    InstallDependencies::new(record.path(), &record.dependencies, &self.registry);
                if poll {
                    loader.poll_install(resource.as_mut(), &dependencies)
                } else {
                    log::debug!("Install {} {}", id, record.path());
                    loader.install(resource.as_mut(), &dependencies)
                }
            }
            None => Err(ResourceError::StringError(format!("no record for {}", id))),
        };

        if let Some(record) = self.registry.get_mut(id) {
            record.resource = Some(resource);
        }

        result
    }

    fn finish_install_step(
        &mut self,
        request_key: RequestKey,
        result: ResourceResult<InstallStatus>,
    ) {
        match result {
            Ok(InstallStatus::Complete) => {
                if let Some(request) = self.release_request(request_key) {
                    if let Some(record) = self.registry.get_mut(request.id) {
                        record.load_state = LoadState::Ready;
                    }
                    log::debug!(
                        "{} {} is ready (requested by {:?} and {} others)",
                        request.id,
                        request.path,
                        request.first_requester,
                        request.requester_count - 1
                    );
                }
            }
            Ok(InstallStatus::InProgress) => self.installing.push(request_key),
            Err(e) => self.fail_request(request_key, e),
        }
    }

    fn release_request(
        &mut self,
        request_key: RequestKey,
    ) -> Option<PendingLoadRequest> {
        let request = self.requests.free(request_key.0)?;
        if let Some(record) = self.registry.get_mut(request.id) {
            record.request = None;
        }

        Some(request)
    }

    fn fail_request(
        &mut self,
        request_key: RequestKey,
        error: ResourceError,
    ) {
        if let Some(request) = self.release_request(request_key) {
            log::debug!(
                "Request for {} failed (requested by {:?} and {} others)",
                request.path,
                request.first_requester,
                request.requester_count - 1
            );
            self.fail_record(request.id, &request.loader, error);
        }
    }

    // Terminal. Device state is released if install had started and the parsed object is dropped.
    fn fail_record(
        &mut self,
        id: ResourceId,
        loader: &Arc<dyn ResourceLoader>,
        error: ResourceError,
    ) {
        if let Some(record) = self.registry.get_mut(id) {
            let was_installing = record.load_state == LoadState::Installing;
            log::error!("Failed to load {} {}: {}", id, record.path(), error);
            record.load_state = LoadState::Failed;
            record.error = Some(error);

            if let Some(mut resource) = record.resource.take() {
                if was_installing {
                    loader.uninstall(resource.as_mut());
                }
                loader.unload(resource);
            }
        }
    }

    //
    // Blocking load
    //

    /// Loads the resource and all of its dependencies before returning. Panics if anything fails,
    /// this is meant for resources the caller cannot continue without.
    pub fn load_blocking(
        &mut self,
        path: &str,
    ) -> ResourceId {
        match self.try_load_blocking(path) {
            Ok(id) => id,
            Err(e) => {
                log::error!("load_blocking({}) failed: {}", path, e);
                panic!("load_blocking({}) failed: {}", path, e);
            }
        }
    }

    pub fn try_load_blocking(
        &mut self,
        path: &str,
    ) -> ResourceResult<ResourceId> {
        profiling::scope!("load_blocking");
        let mut chain = Vec::default();
        let id = self.load_blocking_recursive(path, &mut chain)?;
        if let Some(record) = self.registry.get_mut(id) {
            record.external_request_count += 1;
        }

        Ok(id)
    }

    // chain holds the resources currently being loaded further up the stack
    fn load_blocking_recursive(
        &mut self,
        path: &str,
        chain: &mut Vec<ResourceId>,
    ) -> ResourceResult<ResourceId> {
        if let Some(id) = self.registry.find(path) {
            if chain.contains(&id) {
                return Err(ResourceError::DependencyCycle(path.to_string()));
            }

            self.wait_until_settled(id, chain)?;
            return Ok(id);
        }

        let loader = self.loaders.resolve(path)?;
        let (id, _) = self.registry.get_or_create(path)?;
        if let Some(record) = self.registry.get_mut(id) {
            record.load_state = LoadState::Loading;
        }

        chain.push(id);
        let result = self.load_and_install_blocking(id, &loader, chain);
        chain.pop();

        if let Err(e) = &result {
            // A failed dependency already failed this record with a more specific error
            if !self.registry.get(id).map(|x| x.is_failed()).unwrap_or(true) {
                self.fail_record(id, &loader, e.clone());
            }
        }

        result.map(|_| id)
    }

    fn load_and_install_blocking(
        &mut self,
        id: ResourceId,
        loader: &Arc<dyn ResourceLoader>,
        chain: &mut Vec<ResourceId>,
    ) -> ResourceResult<()> {
        let path = match self.registry.get(id) {
            Some(record) => record.shared_path().clone(),
            None => return Err(ResourceError::StringError(format!("no record for {}", id))),
        };

        let loaded_resource = {
            profiling::scope!("load_blocking read and load");
            let bytes = self.file_system.read_bytes(&path)?;
            load_catching_panics(&**loader, &bytes, &path)?
        };

        if let Some(record) = self.registry.get_mut(id) {
            record.resource = Some(loaded_resource.resource);
            record.load_state = LoadState::Loaded;
        }
        log::debug!("Loaded {} {} inline", id, path);

        for dependency_path in &loaded_resource.dependencies {
            let dependency = match self.load_blocking_recursive(dependency_path, chain) {
                Ok(dependency) => dependency,
                Err(e) => {
                    let dependency_failed = self
                        .registry
                        .find(dependency_path)
                        .and_then(|x| self.registry.get(x))
                        .map(|x| x.is_failed())
                        .unwrap_or(false);
                    if dependency_failed {
                        let error = ResourceError::DependencyFailed {
                            path: path.to_string(),
                            dependency: dependency_path.clone(),
                        };
                        self.fail_record(id, loader, error);
                    }

                    return Err(e);
                }
            };

            self.add_dependency_edge(id, dependency);
        }

        if let Some(record) = self.registry.get_mut(id) {
            record.load_state = LoadState::WaitingForDependencies;
        }

        let mut status = self.run_install_step(id, loader, false)?;
        while status == InstallStatus::InProgress {
            std::thread::yield_now();
            status = self.run_install_step(id, loader, true)?;
        }

        if let Some(record) = self.registry.get_mut(id) {
            record.load_state = LoadState::Ready;
        }
        log::debug!("{} {} is ready", id, path);
        Ok(())
    }

    // The resource is already known. Ticks the asynchronous pipeline until it is ready or failed.
    fn wait_until_settled(
        &mut self,
        id: ResourceId,
        chain: &[ResourceId],
    ) -> ResourceResult<()> {
        loop {
            let record = self
                .registry
                .get(id)
                .ok_or_else(|| ResourceError::StringError(format!("no record for {}", id)))?;

            match record.load_state() {
                LoadState::Ready => return Ok(()),
                LoadState::Failed => {
                    return Err(record.error().cloned().unwrap_or_else(|| {
                        ResourceError::StringError(format!("{} failed to load", record.path()))
                    }));
                }
                _ => {}
            }

            // Not settled and nothing is driving it, or it waits on something further up the
            // chain. Either way it can never finish.
            if record.request.is_none() || self.depends_on_any(id, chain) {
                return Err(ResourceError::DependencyCycle(record.path().to_string()));
            }

            self.tick();
            std::thread::yield_now();
        }
    }
}
