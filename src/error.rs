//! Error kinds surfaced by the engine.
//!
//! Four kinds cover the whole failure surface:
//! - [`Error::Config`] -- rejected before any worker starts (bad task key,
//!   non-positive process count, unsupported dimension, mismatched inputs).
//! - [`Error::Protocol`] -- a violated invariant of the exchange or wire
//!   protocol (unexpected message, count mismatch, wrong leaf id in a
//!   header). Always fatal.
//! - [`Error::Degenerate`] -- input the kernel cannot triangulate (fewer
//!   than `D + 1` affinely independent points).
//! - [`Error::Aborted`] -- a peer worker failed first; the worker reporting
//!   this error was woken out of a barrier so the run could end. The master
//!   reports the peer's original error instead of this one.
//!
//! Unbounded Voronoi cells are *not* errors: they surface as the `-1.0`
//! sentinel in the volume output.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration, rejected synchronously before any worker runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// The exchange or wire protocol was violated; the run is aborted.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The kernel cannot triangulate the input.
    #[error("degenerate input: {0}")]
    Degenerate(String),

    /// A peer worker failed and this worker was shut down with it.
    #[error("run aborted by a failing peer worker")]
    Aborted,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
