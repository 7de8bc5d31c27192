use std::io;
use std::thread;

use threadpool::ThreadPool;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// An execution context the harness hands blocks to.
///
/// A job must run independently of the submitting thread, the harness blocks while it waits.
pub trait Worker: Send {
    fn submit(&self, job: Job) -> io::Result<()>;
}

/// Runs every job on a freshly spawned, detached thread.
#[derive(Debug, Clone)]
pub struct SpawnThread {
    name: String,
}

impl SpawnThread {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Worker for SpawnThread {
    fn submit(&self, job: Job) -> io::Result<()> {
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(job)
            .map(|_detached| ())
    }
}

impl Worker for ThreadPool {
    fn submit(&self, job: Job) -> io::Result<()> {
        self.execute(job);
        Ok(())
    }
}
