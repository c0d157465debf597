//! Serialized call boundary into the host
//!
//! The host object model may only be touched from one thread. `HostQueue`
//! owns the [`SourceAdapter`] on a dedicated worker thread; callers submit
//! closures over a bounded channel and block until the worker replies.
//! A closure must not call back into the same queue.

use super::adapter::{HostError, HostResult, SourceAdapter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, SyncSender};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce(&dyn SourceAdapter) + Send>;

/// Default number of queued jobs before submitters block
pub const DEFAULT_CAPACITY: usize = 16;

/// Single-worker queue that funnels all host access
pub struct HostQueue {
    sender: Option<SyncSender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl HostQueue {
    /// Move `source` onto a new worker thread
    pub fn spawn<S>(source: S) -> std::io::Result<Self>
    where
        S: SourceAdapter + 'static,
    {
        Self::with_capacity(source, DEFAULT_CAPACITY)
    }

    /// Like [`HostQueue::spawn`] with an explicit queue bound
    pub fn with_capacity<S>(source: S, capacity: usize) -> std::io::Result<Self>
    where
        S: SourceAdapter + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel::<Job>(capacity.max(1));
        let worker = thread::Builder::new()
            .name("procontext-host".to_string())
            .spawn(move || {
                for job in receiver {
                    // A panicking job drops its reply sender; the worker keeps serving
                    if panic::catch_unwind(AssertUnwindSafe(|| job(&source))).is_err() {
                        warn!("Host call panicked");
                    }
                }
                debug!("Host queue drained, worker exiting");
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Run `f` on the host thread and wait for its result
    pub fn run<T, F>(&self, f: F) -> HostResult<T>
    where
        F: FnOnce(&dyn SourceAdapter) -> T + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(HostError::Disconnected)?;
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);

        let job: Job = Box::new(move |source| {
            let _ = reply_tx.send(f(source));
        });
        sender.send(job).map_err(|_| HostError::Disconnected)?;

        reply_rx.recv().map_err(|_| HostError::Disconnected)
    }
}

impl Drop for HostQueue {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Host worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::MemorySource;
    use crate::source::HostProject;
    use std::sync::Arc;

    fn queue() -> HostQueue {
        let source = MemorySource::new().with_project(HostProject {
            name: "Parcels".to_string(),
            path: Some("/data/parcels/parcels.aprx".to_string()),
            ..Default::default()
        });
        HostQueue::spawn(source).unwrap()
    }

    #[test]
    fn test_run_returns_value() {
        let q = queue();
        let name = q
            .run(|source| source.project().unwrap().map(|p| p.name))
            .unwrap();
        assert_eq!(name.as_deref(), Some("Parcels"));
    }

    #[test]
    fn test_runs_on_single_worker_thread() {
        let q = queue();
        let a = q.run(|_| thread::current().id()).unwrap();
        let b = q.run(|_| thread::current().id()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, thread::current().id());
    }

    #[test]
    fn test_concurrent_submitters() {
        let q = Arc::new(queue());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let q = Arc::clone(&q);
                thread::spawn(move || q.run(move |_| i * 2).unwrap())
            })
            .collect();
        let mut results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        results.sort();
        assert_eq!(results, vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_panicking_job_disconnects_only_its_caller() {
        let q = queue();
        let result: HostResult<()> = q.run(|_| panic!("host crashed"));
        assert_eq!(result, Err(HostError::Disconnected));
        assert_eq!(q.run(|_| 1), Ok(1));
        let name = q.run(|source| source.project().unwrap().map(|p| p.name)).unwrap();
        assert_eq!(name.as_deref(), Some("Parcels"));
    }
}
