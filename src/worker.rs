//! Bounded worker-thread pool for `Worker`-mode builtins.
//!
//! A fixed set of threads pulls tasks off a shared channel. Each submitted
//! task reports its exit status through a per-invocation reply channel; the
//! pipeline stage that dispatched it blocks on [`WorkerToken::wait`] so
//! "all stages finished" semantics hold even for builtin stages. Background
//! pipelines use [`WorkerPool::submit_detached`] and never wait.
//!
//! Tasks receive everything they need by value at submission time; nothing
//! in the pool touches `ShellState`.
//!
//! Worker threads run with all signals blocked, so a process-directed
//! `SIGINT` or `SIGCHLD` always lands on the interpreter thread — the one
//! whose blocking `waitpid` must see the `EINTR`.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

type Task = Box<dyn FnOnce() -> i32 + Send + 'static>;

struct Envelope {
    task: Task,
    reply: Option<Sender<i32>>,
}

pub struct WorkerPool {
    tx: Sender<Envelope>,
}

/// Handle to one dispatched task; [`wait`](WorkerToken::wait) blocks until
/// the builtin has run and returns its exit status.
pub struct WorkerToken {
    rx: Receiver<i32>,
}

impl WorkerToken {
    pub fn wait(self) -> i32 {
        self.rx.recv().unwrap_or(1)
    }
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let (tx, rx) = channel::<Envelope>();
        let rx = Arc::new(Mutex::new(rx));

        for n in 0..size.max(1) {
            let rx = Arc::clone(&rx);
            let builder = thread::Builder::new().name(format!("minnow-worker-{n}"));
            let spawned = builder.spawn(move || {
                block_signals();
                loop {
                    let envelope = {
                        let guard = match rx.lock() {
                            Ok(g) => g,
                            Err(_) => return,
                        };
                        guard.recv()
                    };
                    match envelope {
                        Ok(Envelope { task, reply }) => {
                            let status = task();
                            if let Some(reply) = reply {
                                let _ = reply.send(status);
                            }
                        }
                        // channel closed: pool dropped, thread retires
                        Err(_) => return,
                    }
                }
            });
            if let Err(e) = spawned {
                log::warn!("could not start worker thread: {}", e);
            }
        }

        Self { tx }
    }

    /// Dispatch a task and get a token to wait for its exit status.
    pub fn submit<F>(&self, task: F) -> WorkerToken
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        let (reply_tx, reply_rx) = channel();
        let envelope = Envelope {
            task: Box::new(task),
            reply: Some(reply_tx),
        };
        // send only fails if every worker died; the token then yields 1
        let _ = self.tx.send(envelope);
        WorkerToken { rx: reply_rx }
    }

    /// Dispatch a task nobody will wait for (background pipeline stages).
    pub fn submit_detached<F>(&self, task: F)
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        let envelope = Envelope {
            task: Box::new(task),
            reply: None,
        };
        let _ = self.tx.send(envelope);
    }
}

/// Mask every signal on the calling thread; asynchronous signals then go to
/// the interpreter thread only.
fn block_signals() {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigfillset(&mut set);
        libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
    }
}
