//! mcrypt-engine: wires the engines, container, and pool together
//!
//! An [`Engine`] is constructed once as either *direct* (in-process,
//! synchronous) or *pooled* (batch operations fan out across the worker
//! pool). There is no runtime mode switch; choose at construction.

pub mod engine;

pub use engine::{algorithm_info, Engine};
