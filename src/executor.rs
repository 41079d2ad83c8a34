//! Initialization executor
//!
//! One dedicated worker thread that runs recognizer loads in submission
//! order, so at most one heavy model load is in flight at a time.

use crate::error::{SayResult, SayboardError};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct InitExecutor {
    sender: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for InitExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitExecutor").finish()
    }
}

impl InitExecutor {
    pub fn new() -> SayResult<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();

        let worker = thread::Builder::new()
            .name("sayboard-init".to_string())
            .spawn(move || {
                debug!("Init worker started");
                while let Ok(job) = receiver.recv() {
                    job();
                }
                debug!("Init worker stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Queue a job behind any pending ones
    pub fn execute<F>(&self, job: F) -> SayResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .as_ref()
            .ok_or(SayboardError::ExecutorClosed)?
            .send(Box::new(job))
            .map_err(|_| SayboardError::ExecutorClosed)
    }
}

impl Drop for InitExecutor {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Init worker panicked");
            } else {
                info!("🧹 Init worker joined");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_jobs_run_in_submission_order() {
        let executor = InitExecutor::new().unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            executor
                .execute(move || {
                    // Earlier jobs sleep longer; order must still hold
                    thread::sleep(Duration::from_millis(5 * (5 - i)));
                    order.lock().unwrap().push(i);
                })
                .unwrap();
        }

        drop(executor);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_jobs_run_on_single_worker() {
        let executor = InitExecutor::new().unwrap();
        let names = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..3 {
            let names = names.clone();
            executor
                .execute(move || {
                    let name = thread::current().name().map(str::to_string);
                    names.lock().unwrap().push(name);
                })
                .unwrap();
        }

        drop(executor);
        let names = names.lock().unwrap();
        assert_eq!(names.len(), 3);
        assert!(names
            .iter()
            .all(|n| n.as_deref() == Some("sayboard-init")));
    }
}
