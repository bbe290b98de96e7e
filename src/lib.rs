//! # Tessella
//!
//! A **parallel Delaunay triangulation engine**: one global Delaunay
//! triangulation (and, derived from it, per-point Voronoi cell volumes)
//! over a large 2D or 3D point set, built by partitioning the domain,
//! triangulating every partition locally, exchanging boundary points
//! until every local triangulation is consistent on its interior, and
//! stitching the per-partition results back into a single structure.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tessella::{DomainTree, Engine, PointArray, Triangulation};
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! // An (N, D) coordinate array, D = 2 or 3.
//! let pts = PointArray::from_flat(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0], 2)?;
//!
//! // Decompose the domain into leaves of at most 2 points each.
//! let tree = DomainTree::build(&pts, 2)?;
//!
//! // Triangulate on 2 processes and compare against the serial kernel.
//! let engine = Engine { nproc: 2, ..Default::default() };
//! let parallel = engine.triangulate(&pts, &tree)?;
//! let serial = Triangulation::build_serial(&pts)?;
//! assert!(parallel.is_equivalent(&serial));
//!
//! // Voronoi cell volumes, -1 marking unbounded hull cells.
//! let volumes = engine.voronoi_volumes(&pts, &tree)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## How a run works
//!
//! 1. The master ([`Engine`]) publishes the point array and the
//!    decomposition's index permutation as shared read-only buffers, then
//!    spawns `P` processes; leaf `l` is driven by process `l mod P`.
//! 2. Every [`PartitionWorker`] tessellates its owned slice, then the
//!    [`ExchangeCoordinator`]s run barrier-synchronized rounds of
//!    `{send halo, receive halo, vote}`: each round ships the owned
//!    points whose circumballs reach a neighbor's (possibly periodically
//!    translated) box, and the neighbor set itself grows transitively
//!    from incoming introductions. The round that moves zero points
//!    globally is the last one -- a sound fixed point, because a silent
//!    round can introduce no new neighbors either.
//! 3. Each worker serializes its local triangulation onto a dedicated
//!    channel; the master drains them round-robin and the consolidator
//!    merges them: cells are deduplicated by owner (the leaf owning the
//!    smallest vertex), the per-leaf infinite indices collapse to one
//!    canonical infinite vertex, and neighbor pointers are rewired
//!    through a global vertex-tuple index.
//!
//! Periodic domains are handled per axis: halo points wrap by
//! `±domain_width` toward whichever side of the receiving leaf is nearer,
//! and a leaf spanning a periodic axis alone legally neighbors itself.
//!
//! ## Module Overview
//!
//! - [`points`] - the immutable `(N, D)` coordinate array
//! - [`decomp`] - k-d domain decomposition into box-tiling leaves
//! - [`delaunay`] - the serial incremental Delaunay kernel
//! - [`partition`] - per-leaf state and the halo protocol's local half
//! - [`exchange`] - the round loop and the termination detector
//! - [`wire`] - mailbox messages and the output-channel byte formats
//! - [`consolidate`] - the merge of per-leaf serialized triangulations
//! - [`triangulation`] - the consolidated result object
//! - [`engine`] - the master: spawning, draining, error policy
//! - [`stats`] - per-round exchange totals
//! - [`geometry`] - orientation / in-sphere predicates and metric helpers
//! - [`testing`] - assertions, builders and fixtures for tests
//!
//! ## Failure model
//!
//! Configuration problems ([`Error::Config`]) surface before any worker
//! starts. During a run, workers fail fast: the first error poisons the
//! shared termination state, peers unwind with [`Error::Aborted`], and
//! the master reports the original error. There is no partial-result
//! recovery. An unbounded Voronoi cell is *not* an error; it is the
//! `-1.0` sentinel in the volume output.

pub mod consolidate;
pub mod decomp;
pub mod delaunay;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod geometry;
pub mod partition;
pub mod points;
pub mod stats;
pub mod testing;
pub mod triangulation;
pub mod wire;

// General re-exports
pub use consolidate::consolidate_leaves;
pub use decomp::{DomainTree, Leaf};
pub use delaunay::{Delaunay, IndexKind, IndexVec};
pub use engine::{Engine, Task};
pub use error::{Error, Result};
pub use exchange::{ExchangeCoordinator, TerminationState};
pub use partition::{NeighborEntry, PartitionWorker};
pub use points::PointArray;
pub use stats::ExchangeStats;
pub use triangulation::Triangulation;
pub use wire::{Message, SerializedLeaf};
