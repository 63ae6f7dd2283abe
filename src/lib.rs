//! minnow — a small POSIX-style command shell.
//!
//! The crate is a pipeline of narrow modules:
//!
//! | Module | Role |
//! |--------|------|
//! | [`parser`] | tokenizer + syntax tree (sequences, pipelines, words) |
//! | [`expand`] | tilde / variable / glob expansion over parsed words |
//! | [`glob`] | `*` and `?` filename matching |
//! | [`path`] | command resolution: builtins, private bin dir, `PATH` |
//! | [`redirect`] | opening `<` `>` `>>` targets as owned descriptors |
//! | [`spawn`] | `posix_spawn` wrapper (process group, signals, fd wiring) |
//! | [`builtins`] | builtin registry, main-thread / worker dispatch |
//! | [`worker`] | bounded thread pool for worker-mode builtins |
//! | [`exec`] | the executor: wires stages, waits, collects status |
//! | [`job`] | job table, foreground wait, terminal handoff |
//! | [`signals`] | flag-based signal handlers |
//! | [`state`] | shell-wide state and worker snapshots |
//! | [`history`] | persistent command history |

pub mod builtins;
pub mod exec;
pub mod expand;
pub mod glob;
pub mod history;
pub mod job;
pub mod parser;
pub mod path;
pub mod redirect;
pub mod signals;
pub mod spawn;
pub mod state;
pub mod worker;
