use crate::file_system::ResourceFileSystem;
use crate::resource_loader::{LoadedResource, ResourceLoader};
use crate::resource_system::RequestKey;
use crate::scheduler::{TaskHandle, TaskScheduler};
use hearth_base::{ResourceError, ResourceId, ResourceResult};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

/// One background load. Owned by the streaming job between submit and exchange.
pub(crate) struct AsyncLoadRequestState {
    pub(crate) request_key: RequestKey,
    pub(crate) id: ResourceId,
    pub(crate) path: Arc<str>,
    pub(crate) loader: Arc<dyn ResourceLoader>,
    // Raw file contents, released as soon as the loader is done with them
    pub(crate) bytes: Vec<u8>,
    // Filled in by the worker
    pub(crate) output: Option<ResourceResult<LoadedResource>>,
}

#[derive(Default)]
struct StreamingQueues {
    pending: Vec<AsyncLoadRequestState>,
    loaded: Vec<AsyncLoadRequestState>,
}

/// Reads and parses batches of requests on the task scheduler. At most one batch is in flight at a
/// time. The queues are the only state shared with the worker, and are only touched under the
/// mutex.
pub(crate) struct StreamingJob {
    queues: Arc<Mutex<StreamingQueues>>,
    file_system: Arc<dyn ResourceFileSystem>,
    in_flight: Option<TaskHandle>,
    batches_submitted: u64,
}

impl StreamingJob {
    pub(crate) fn new(file_system: Arc<dyn ResourceFileSystem>) -> Self {
        StreamingJob {
            queues: Default::default(),
            file_system,
            in_flight: None,
            batches_submitted: 0,
        }
    }

    fn lock_queues(&self) -> MutexGuard<StreamingQueues> {
        // Loader panics are caught inside the batch. The queues stay valid if the lock is poisoned.
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Clears the in-flight batch if it has completed
    pub(crate) fn is_in_flight(&mut self) -> bool {
        match &self.in_flight {
            Some(handle) if !handle.is_complete() => true,
            Some(_) => {
                self.in_flight = None;
                false
            }
            None => false,
        }
    }

    pub(crate) fn has_batch_in_flight(&self) -> bool {
        self.in_flight
            .as_ref()
            .map(|x| !x.is_complete())
            .unwrap_or(false)
    }

    pub(crate) fn batches_submitted(&self) -> u64 {
        self.batches_submitted
    }

    /// Queues new requests and takes everything the last batch finished
    pub(crate) fn exchange(
        &mut self,
        new_requests: Vec<AsyncLoadRequestState>,
    ) -> Vec<AsyncLoadRequestState> {
        debug_assert!(!self.has_batch_in_flight());
        let mut queues = self.lock_queues();
        queues.pending.extend(new_requests);
        std::mem::take(&mut queues.loaded)
    }

    /// Queues new requests and, if anything is pending, hands the whole pending queue to the
    /// scheduler as one batch
    pub(crate) fn submit(
        &mut self,
        new_requests: Vec<AsyncLoadRequestState>,
        scheduler: &dyn TaskScheduler,
    ) {
        debug_assert!(!self.has_batch_in_flight());
        let batch = {
            let mut queues = self.lock_queues();
            queues.pending.extend(new_requests);
            std::mem::take(&mut queues.pending)
        };

        if batch.is_empty() {
            return;
        }

        self.batches_submitted += 1;
        log::debug!(
            "Submit streaming batch {} with {} requests",
            self.batches_submitted,
            batch.len()
        );

        let queues = self.queues.clone();
        let file_system = self.file_system.clone();
        let task = move || {
            let mut batch = batch;
            run_batch(&mut batch, &*file_system);
            queues
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .loaded
                .extend(batch);
        };

        // An inline scheduler has already completed the task when submit() returns
        self.in_flight = Some(scheduler.submit(Box::new(task)));
    }
}

/// A loader that panics fails only the resource it was loading
pub(crate) fn load_catching_panics(
    loader: &dyn ResourceLoader,
    bytes: &[u8],
    path: &str,
) -> ResourceResult<LoadedResource> {
    std::panic::catch_unwind(AssertUnwindSafe(|| loader.load(bytes, path)))
        .unwrap_or_else(|_| Err(ResourceError::parse_error(path, "loader panicked")))
}

#[profiling::function]
fn run_batch(
    batch: &mut [AsyncLoadRequestState],
    file_system: &dyn ResourceFileSystem,
) {
    for request in batch {
        log::trace!("Streaming job load {} {}", request.id, request.path);
        let output = match file_system.read_bytes(&request.path) {
            Ok(bytes) => {
                request.bytes = bytes;
                load_catching_panics(&*request.loader, &request.bytes, &request.path)
            }
            Err(e) => Err(e),
        };

        request.bytes = Vec::default();
        request.output = Some(output);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::file_system::MemoryFileSystem;
    use crate::resource_loader::{InstallDependencies, InstallStatus, Resource};
    use crate::scheduler::InlineScheduler;

    struct Blob(Vec<u8>);

    impl Resource for Blob {}

    struct BlobLoader;

    impl ResourceLoader for BlobLoader {
        fn loadable_types(&self) -> &[&'static str] {
            &["blob"]
        }

        fn load(
            &self,
            bytes: &[u8],
            path: &str,
        ) -> ResourceResult<LoadedResource> {
            if bytes.is_empty() {
                panic!("empty blob {}", path);
            }
            Ok(LoadedResource::new(Blob(bytes.to_vec())))
        }

        fn install(
            &self,
            _resource: &mut dyn Resource,
            _dependencies: &InstallDependencies,
        ) -> ResourceResult<InstallStatus> {
            Ok(InstallStatus::Complete)
        }
    }

    fn request(
        index: usize,
        path: &str,
    ) -> AsyncLoadRequestState {
        AsyncLoadRequestState {
            request_key: RequestKey::new(index),
            id: ResourceId::from_slot_index(index),
            path: Arc::from(path),
            loader: Arc::new(BlobLoader),
            bytes: Vec::default(),
            output: None,
        }
    }

    #[test]
    fn batch_outputs_are_per_request() {
        let file_system = Arc::new(MemoryFileSystem::default());
        file_system.add_file("a.blob", vec![1, 2]);
        file_system.add_file("empty.blob", vec![]);

        let mut job = StreamingJob::new(file_system);
        assert!(job.exchange(vec![request(0, "a.blob")]).is_empty());
        job.submit(
            vec![request(1, "missing.blob"), request(2, "empty.blob")],
            &InlineScheduler,
        );
        assert_eq!(job.batches_submitted(), 1);
        assert!(!job.is_in_flight());

        let loaded = job.exchange(Vec::default());
        assert_eq!(loaded.len(), 3);

        let a = loaded[0].output.as_ref().unwrap().as_ref().unwrap();
        assert_eq!(a.resource.downcast_ref::<Blob>().unwrap().0, vec![1, 2]);
        assert!(loaded[0].bytes.is_empty());

        match loaded[1].output.as_ref().unwrap() {
            Err(ResourceError::NotFound(_)) => {}
            _ => panic!("expected NotFound"),
        }
        match loaded[2].output.as_ref().unwrap() {
            Err(ResourceError::ParseError { .. }) => {}
            _ => panic!("expected ParseError"),
        }
    }

    #[test]
    fn nothing_pending_submits_nothing() {
        let mut job = StreamingJob::new(Arc::new(MemoryFileSystem::default()));
        job.submit(Vec::default(), &InlineScheduler);
        assert_eq!(job.batches_submitted(), 0);
        assert!(!job.has_batch_in_flight());
    }
}
