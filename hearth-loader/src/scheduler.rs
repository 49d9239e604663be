use crossbeam_channel::{Receiver, Sender};
use hearth_base::ResourceResult;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Completion flag of a submitted task. Polled, never waited on.
#[derive(Clone, Debug, Default)]
pub struct TaskHandle {
    complete: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    fn set_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }
}

/// Runs units of work somewhere other than the caller's stack frame
pub trait TaskScheduler: Send + Sync {
    fn submit(
        &self,
        task: Task,
    ) -> TaskHandle;
}

// The handle completes even if the task panics
fn run_task(
    task: Task,
    handle: &TaskHandle,
) {
    if std::panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        log::error!("Task panicked");
    }
    handle.set_complete();
}

/// Runs every task immediately on the submitting thread. Deterministic, used by tests and tools.
#[derive(Default)]
pub struct InlineScheduler;

impl TaskScheduler for InlineScheduler {
    fn submit(
        &self,
        task: Task,
    ) -> TaskHandle {
        let handle = TaskHandle::default();
        run_task(task, &handle);
        handle
    }
}

struct ScheduledTask {
    task: Task,
    handle: TaskHandle,
}

// Thread that tries to take tasks out of the request channel and ends when the finish channel is signalled
struct WorkerThread {
    finish_tx: Sender<()>,
    join_handle: JoinHandle<()>,
}

impl WorkerThread {
    fn new(
        request_rx: Receiver<ScheduledTask>,
        thread_index: usize,
    ) -> ResourceResult<Self> {
        let (finish_tx, finish_rx) = crossbeam_channel::bounded(1);
        let join_handle = std::thread::Builder::new()
            .name(format!("Resource Worker {}", thread_index))
            .spawn(move || {
                profiling::register_thread!(&format!("ResourceWorkerThread {}", thread_index));
                loop {
                    crossbeam_channel::select! {
                        recv(request_rx) -> msg => {
                            // Disconnected means the pool is gone
                            let msg = match msg {
                                Ok(msg) => msg,
                                Err(_) => return,
                            };

                            profiling::scope!("ScheduledTask");
                            log::trace!("Worker {} start task", thread_index);
                            run_task(msg.task, &msg.handle);
                            log::trace!("Worker {} finished task", thread_index);
                        },
                        recv(finish_rx) -> _msg => {
                            return;
                        }
                    }
                }
            })?;

        Ok(WorkerThread {
            finish_tx,
            join_handle,
        })
    }
}

/// Spawns N threads, hands tasks to whichever is free, and joins the threads when dropped
pub struct ThreadPoolScheduler {
    worker_threads: Vec<WorkerThread>,
    request_tx: Sender<ScheduledTask>,
}

impl ThreadPoolScheduler {
    pub fn new(thread_count: usize) -> ResourceResult<Self> {
        let thread_count = thread_count.max(1);
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<ScheduledTask>();

        let mut worker_threads = Vec::with_capacity(thread_count);
        for thread_index in 0..thread_count {
            worker_threads.push(WorkerThread::new(request_rx.clone(), thread_index)?);
        }

        log::debug!("Started {} resource worker threads", thread_count);
        Ok(ThreadPoolScheduler {
            worker_threads,
            request_tx,
        })
    }

    pub fn thread_count(&self) -> usize {
        self.worker_threads.len()
    }
}

impl TaskScheduler for ThreadPoolScheduler {
    fn submit(
        &self,
        task: Task,
    ) -> TaskHandle {
        let handle = TaskHandle::default();
        let scheduled = ScheduledTask {
            task,
            handle: handle.clone(),
        };

        // Workers only exit when the pool is dropped
        if let Err(e) = self.request_tx.send(scheduled) {
            log::error!("Resource worker threads are gone, running task inline");
            let scheduled = e.into_inner();
            run_task(scheduled.task, &scheduled.handle);
        }

        handle
    }
}

impl Drop for ThreadPoolScheduler {
    fn drop(&mut self) {
        for worker_thread in &self.worker_threads {
            let _ = worker_thread.finish_tx.send(());
        }

        for worker_thread in self.worker_threads.drain(..) {
            if worker_thread.join_handle.join().is_err() {
                log::error!("Resource worker thread panicked");
            }
        }
    }
}
