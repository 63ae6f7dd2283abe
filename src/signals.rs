//! Signal manager: flag-only handlers drained by the interpreter loop.
//!
//! Handlers never allocate or do unbounded work; they store into an atomic
//! and return. The interpreter checks the flags at the top of each input-loop
//! iteration and the job controller drains `SIGCHLD` via a non-blocking reap.
//!
//! Dispositions installed by [`install`]:
//!
//! - `SIGINT` — flag, no `SA_RESTART`: a blocking terminal read returns
//!   `EINTR` so the current line can be abandoned and the prompt redrawn.
//! - `SIGTERM` — flag, `SA_RESTART`: the shell finishes the currently
//!   prompted read, then exits gracefully.
//! - `SIGCHLD` — flag, `SA_RESTART`: reaping happens synchronously on the
//!   interpreter thread, never in handler context.
//! - `SIGWINCH` — flag, `SA_RESTART`.
//! - `SIGPIPE` — ignored: writes to a closed pipe fail with `EPIPE` instead
//!   of killing the shell, so `producer | head` pipelines wind down cleanly.
//! - `SIGTSTP`, `SIGTTOU`, `SIGTTIN` — ignored: terminal stop signals go to
//!   the foreground process group (the shell hands over the terminal with
//!   `tcsetpgrp`), never to the shell itself or to background jobs.
//!
//! Children get every disposition reset to `SIG_DFL` at spawn time
//! ([`crate::spawn`]).

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static TERMINATED: AtomicBool = AtomicBool::new(false);
static CHILD_PENDING: AtomicBool = AtomicBool::new(false);
static WINCH_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_sig: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

extern "C" fn on_sigterm(_sig: libc::c_int) {
    TERMINATED.store(true, Ordering::SeqCst);
}

extern "C" fn on_sigchld(_sig: libc::c_int) {
    CHILD_PENDING.store(true, Ordering::SeqCst);
}

extern "C" fn on_sigwinch(_sig: libc::c_int) {
    WINCH_PENDING.store(true, Ordering::SeqCst);
}

/// Install a handler with `sigaction`. `restart` controls `SA_RESTART`.
fn set_handler(sig: libc::c_int, handler: extern "C" fn(libc::c_int), restart: bool) {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = handler as libc::sighandler_t;
        libc::sigemptyset(&mut sa.sa_mask);
        sa.sa_flags = if restart { libc::SA_RESTART } else { 0 };
        if libc::sigaction(sig, &sa, std::ptr::null_mut()) == -1 {
            log::warn!("sigaction({}) failed: {}", sig, std::io::Error::last_os_error());
        }
    }
}

fn ignore(sig: libc::c_int) {
    unsafe {
        libc::signal(sig, libc::SIG_IGN);
    }
}

/// Install every shell-side signal disposition. Called once at startup,
/// before the first prompt.
pub fn install() {
    INTERRUPTED.store(false, Ordering::SeqCst);
    TERMINATED.store(false, Ordering::SeqCst);
    CHILD_PENDING.store(false, Ordering::SeqCst);

    set_handler(libc::SIGINT, on_sigint, false);
    set_handler(libc::SIGTERM, on_sigterm, true);
    set_handler(libc::SIGCHLD, on_sigchld, true);
    set_handler(libc::SIGWINCH, on_sigwinch, true);

    ignore(libc::SIGPIPE);
    ignore(libc::SIGTSTP);
    ignore(libc::SIGTTOU);
    ignore(libc::SIGTTIN);

    log::debug!("signal handlers installed");
}

/// Consume the interrupt flag. Returns `true` if `SIGINT` arrived since the
/// last check.
pub fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}

pub fn clear_interrupt() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// `true` once `SIGTERM` has been delivered; never reset — the read loop
/// finishes its current iteration and exits.
pub fn termination_requested() -> bool {
    TERMINATED.load(Ordering::SeqCst)
}

/// Consume the `SIGCHLD` flag. The caller is expected to run a non-blocking
/// reap when this returns `true`.
pub fn take_child_pending() -> bool {
    CHILD_PENDING.swap(false, Ordering::SeqCst)
}
