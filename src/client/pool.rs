//! Bounded-parallelism request pool
//!
//! Fans out independent jobs and collects one result per job without letting
//! any single failure abort its siblings. Parallelism is clamped so a caller
//! cannot exhaust sockets or memory with a bad configuration value.

use futures_util::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::client::{ClientError, ClientResult};
use crate::config::clamp_parallelism;
use crate::shutdown::SharedShutdown;

/// Bounded-parallelism executor for independent jobs.
#[derive(Clone)]
pub struct RequestPool {
    parallelism: usize,
    shutdown: Option<SharedShutdown>,
}

impl RequestPool {
    /// Create a pool. `parallelism` is clamped to 1..=100.
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: clamp_parallelism(parallelism),
            shutdown: None,
        }
    }

    /// Attach a shared shutdown handle for cancellation.
    ///
    /// Once shutdown is requested, jobs not yet started resolve to
    /// [`ClientError::Cancelled`] and in-flight jobs are abandoned at their
    /// next suspension point.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// The effective (clamped) parallelism.
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Fan out `worker` over every job, yielding `(job, result)` pairs as
    /// they complete.
    ///
    /// At most [`Self::parallelism`] jobs run at once; new jobs are started
    /// only while the returned stream is being polled, so a consumer that
    /// pauses between items also pauses further submission. A failed job
    /// yields its error in place, and its siblings proceed unaffected.
    pub fn stream<J, T, F, Fut>(
        &self,
        jobs: Vec<J>,
        worker: F,
    ) -> impl Stream<Item = (J, ClientResult<T>)>
    where
        J: Clone + Send,
        T: Send,
        F: Fn(J) -> Fut,
        Fut: Future<Output = ClientResult<T>> + Send,
    {
        debug!(
            jobs = jobs.len(),
            parallelism = self.parallelism,
            "running job batch"
        );

        let worker = Arc::new(worker);
        let shutdown = self.shutdown.clone();
        let parallelism = self.parallelism;

        futures_util::stream::iter(jobs.into_iter().map(move |job| {
            let worker = worker.clone();
            let shutdown = shutdown.clone();
            async move {
                if let Some(handle) = &shutdown {
                    if handle.is_shutdown_requested() {
                        return (job, Err(ClientError::Cancelled));
                    }
                }

                let work = (*worker)(job.clone());
                let result = match &shutdown {
                    Some(handle) => tokio::select! {
                        result = work => result,
                        _ = handle.wait_for_shutdown() => Err(ClientError::Cancelled),
                    },
                    None => work.await,
                };
                (job, result)
            }
        }))
        .buffer_unordered(parallelism)
    }

    /// Run `worker` over every job and collect the results.
    ///
    /// Returns one `(job, result)` pair per input job, in completion order;
    /// the pairing keeps the mapping unambiguous.
    pub async fn run<J, T, F, Fut>(&self, jobs: Vec<J>, worker: F) -> Vec<(J, ClientResult<T>)>
    where
        J: Clone + Send,
        T: Send,
        F: Fn(J) -> Fut,
        Fut: Future<Output = ClientResult<T>> + Send,
    {
        self.stream(jobs, worker).collect().await
    }
}
