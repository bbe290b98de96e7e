//! Testing utilities for triangulation runs.
//!
//! This module backs the crate's own test suite and is public so
//! downstream users can test their pipelines the same way:
//!
//! - **Assertions**: compare parallel results against serial references
//!   ([`assert_triangulations_equivalent`], [`assert_volumes_close`]).
//! - **Builders**: seeded random point clouds, duplicate injection, and
//!   the image-replication serial reference for periodic domains.
//! - **Fixtures**: small point sets with hand-checked triangulation
//!   counts, used by the scenario tests.
//!
//! ```no_run
//! use tessella::testing::*;
//! use tessella::{DomainTree, Engine, Triangulation};
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let pts = random_points(1000, 2, 42);
//! let tree = DomainTree::build(&pts, 500)?;
//! let parallel = Engine { nproc: 2, ..Default::default() }.triangulate(&pts, &tree)?;
//! let serial = Triangulation::build_serial(&pts)?;
//! assert_triangulations_equivalent(&parallel, &serial);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
