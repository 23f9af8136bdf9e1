//! Fixed-size worker pool for tile shading.
//!
//! Tasks are independent closures; the only synchronization point is the
//! idle barrier the submission thread blocks on at end of pass. A task
//! that panics is isolated: the pool logs it and keeps the worker alive,
//! because a wedged barrier would deadlock the frame.

use crossbeam_channel::{unbounded, Sender};
use log::{debug, error};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Barrier {
    pending: Mutex<usize>,
    idle: Condvar,
}

pub struct JobSystem {
    sender: Option<Sender<Job>>,
    barrier: Arc<Barrier>,
    workers: Vec<JoinHandle<()>>,
}

impl JobSystem {
    /// Spawns `threads` workers; 0 selects the hardware parallelism.
    pub fn new(threads: usize) -> JobSystem {
        let threads = if threads == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            threads
        };
        let (sender, receiver) = unbounded::<Job>();
        let barrier = Arc::new(Barrier {
            pending: Mutex::new(0),
            idle: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let receiver = receiver.clone();
            let barrier = barrier.clone();
            workers.push(
                thread::Builder::new()
                    .name(format!("glint-worker-{}", i))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                                error!("worker task panicked; output for its tile is dropped");
                            }
                            let mut pending = barrier.pending.lock().unwrap();
                            *pending -= 1;
                            if *pending == 0 {
                                barrier.idle.notify_all();
                            }
                        }
                    })
                    .expect("failed to spawn worker thread"),
            );
        }
        debug!("job system started with {} workers", threads);

        JobSystem {
            sender: Some(sender),
            barrier,
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queues a task for any worker.
    pub fn execute<F: FnOnce() + Send + 'static>(&self, job: F) {
        {
            let mut pending = self.barrier.pending.lock().unwrap();
            *pending += 1;
        }
        self.sender
            .as_ref()
            .expect("job system already shut down")
            .send(Box::new(job))
            .expect("worker channel closed");
    }

    /// Blocks until every queued task has finished.
    pub fn wait_idle(&self) {
        let mut pending = self.barrier.pending.lock().unwrap();
        while *pending > 0 {
            pending = self.barrier.idle.wait(pending).unwrap();
        }
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.wait_idle();
        // closing the channel ends the worker loops
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
