//! Background traceroute worker.
//!
//! Traceroutes are slow, and a single /routes invocation can ask for dozens
//! of them. Instead of spawning a task per request, jobs go through a bounded
//! queue drained by one worker with a fixed pacing gap, which caps both
//! concurrency and radio airtime. When the queue is full the job is dropped
//! with a warning.

use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::meshtastic::DeviceHandle;

/// Gap between consecutive traceroute dispatches.
const ROUTE_GAP: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteJob {
    pub dest: String,
}

/// Submission side of the traceroute queue.
#[derive(Debug, Clone)]
pub struct RouteWorkerHandle {
    tx: mpsc::Sender<RouteJob>,
}

impl RouteWorkerHandle {
    /// Enqueue a traceroute. An empty destination is a no-op; a full queue
    /// drops the job. Returns whether the job was accepted.
    pub fn submit(&self, dest: &str) -> bool {
        if dest.is_empty() {
            return false;
        }
        match self.tx.try_send(RouteJob {
            dest: dest.to_string(),
        }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!("Traceroute queue full, dropping request for {}", job.dest);
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!("Traceroute worker gone, dropping request for {}", job.dest);
                false
            }
        }
    }

    /// Bare queue without a worker, for tests that assert on submissions.
    #[doc(hidden)]
    pub fn queue(capacity: usize) -> (Self, mpsc::Receiver<RouteJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

/// Spawn the worker task and return its submission handle.
pub fn spawn(device: DeviceHandle, capacity: usize) -> RouteWorkerHandle {
    let (handle, mut jobs) = RouteWorkerHandle::queue(capacity.max(1));
    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            debug!("Dispatching traceroute to {}", job.dest);
            device.traceroute(job.dest);
            tokio::time::sleep(ROUTE_GAP).await;
        }
        debug!("traceroute worker terminated");
    });
    handle
}
