//! mcrypt-pool: a fixed-size worker pool for bulk cryptographic work
//!
//! The pool is generic over task closures, so it carries no dependency on
//! the engines and is testable in isolation with stub tasks. Inputs move
//! into the task by value; no key material is shared by reference across
//! the worker boundary.

pub mod scheduler;

pub use scheduler::WorkerPool;
