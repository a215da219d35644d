//! One-shot background work.
//!
//! A job is handed to a [`Spawner`] together with everything it needs (moved,
//! never shared), and its single result comes back over a bounded channel.
//! There is no cancellation and no retry: callers decide what to do when the
//! worker cannot be started or goes away without answering.

use std::fmt::Display;

use crossbeam_channel::{Receiver, TryRecvError, bounded};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("failed to start worker `{name}`: {reason}")]
    Spawn { name: String, reason: String },
    #[error("worker `{name}` went away without a result")]
    Disconnected { name: String },
    #[error("worker `{name}` failed: {reason}")]
    Failed { name: String, reason: String },
}

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where a task runs. Implementations must either run `task` (now or later)
/// or return an error; dropping it silently is reported to the waiting side
/// as [`WorkerError::Disconnected`].
pub trait Spawner {
    fn spawn(&self, name: &str, task: Task) -> Result<(), WorkerError>;
}

/// Runs each task on a fresh named OS thread.
#[derive(Debug, Default, Copy, Clone)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, name: &str, task: Task) -> Result<(), WorkerError> {
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(task)
            .map(|_detached| ())
            .map_err(|e| WorkerError::Spawn {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Runs each task immediately on the calling thread. Used where threads are
/// unavailable.
#[derive(Debug, Default, Copy, Clone)]
pub struct InlineSpawner;

impl Spawner for InlineSpawner {
    fn spawn(&self, _name: &str, task: Task) -> Result<(), WorkerError> {
        task();
        Ok(())
    }
}

/// Receiving end of a single background job.
#[derive(Debug)]
pub struct OneShot<T> {
    name: String,
    rx: Receiver<Result<T, String>>,
}

impl<T: Send + 'static> OneShot<T> {
    pub fn spawn<F, E>(spawner: &dyn Spawner, name: &str, job: F) -> Result<Self, WorkerError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: Display,
    {
        let (tx, rx) = bounded(1);
        spawner.spawn(
            name,
            Box::new(move || {
                let result = job().map_err(|e| e.to_string());
                // The receiver may already be gone; nothing left to tell.
                let _ = tx.send(result);
            }),
        )?;

        Ok(Self {
            name: name.to_string(),
            rx,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking check. `None` while the job is still running.
    pub fn try_take(&self) -> Option<Result<T, WorkerError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(self.map_result(result)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(WorkerError::Disconnected {
                name: self.name.clone(),
            })),
        }
    }

    /// Blocks until the job answers or its sender is dropped.
    pub fn wait(self) -> Result<T, WorkerError> {
        match self.rx.recv() {
            Ok(result) => self.map_result(result),
            Err(_) => Err(WorkerError::Disconnected { name: self.name }),
        }
    }

    fn map_result(&self, result: Result<T, String>) -> Result<T, WorkerError> {
        result.map_err(|reason| WorkerError::Failed {
            name: self.name.clone(),
            reason,
        })
    }
}
