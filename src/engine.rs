// src/engine.rs

//! The master/reducer: spawns the exchange, drains results, consolidates.
//!
//! An [`Engine`] owns the run-wide knobs (process count, forced 64-bit
//! indices) and drives a whole computation: it publishes the shared
//! read-only buffers, spawns one scoped thread per process with the leaf
//! assignment `leaf.id mod P`, wires the mailbox and output channels plus
//! the termination state, and then plays the master role -- draining every
//! worker's dedicated output channel with non-blocking round-robin polls
//! so a slow process never head-of-line blocks a fast one.
//!
//! Failure policy is all-or-nothing: the first worker error poisons the
//! termination state, every peer unwinds with [`Error::Aborted`], and the
//! original error is what the run reports.

use std::str::FromStr;

use crossbeam_channel::{Receiver, TryRecvError, unbounded};
use log::{debug, info};

use crate::consolidate::consolidate_leaves;
use crate::decomp::DomainTree;
use crate::error::{Error, Result};
use crate::exchange::{ExchangeCoordinator, TerminationState};
use crate::partition::PartitionWorker;
use crate::points::PointArray;
use crate::stats::ExchangeStats;
use crate::triangulation::Triangulation;
use crate::wire::{SerializedLeaf, TriangulationDecoder, VolumesDecoder};

/// What a run computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Build and consolidate the global triangulation.
    Triangulate,
    /// Compute per-point Voronoi cell volumes.
    Volumes,
}

impl FromStr for Task {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "triangulate" => Ok(Task::Triangulate),
            "volumes" => Ok(Task::Volumes),
            other => Err(Error::Config(format!("'{other}' is not a valid task"))),
        }
    }
}

/// Run configuration and entry points.
pub struct Engine {
    /// Number of parallel processes. Leaves are assigned `id mod nproc`.
    pub nproc: usize,
    /// Force 64-bit indices in the consolidated tables even when the point
    /// count fits 32 bits.
    pub use_double: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self { nproc: num_cpus::get().max(1), use_double: false }
    }
}

enum RunOutput {
    Tess(Triangulation),
    Vols(Vec<f64>),
}

impl Engine {
    /// Construct the consolidated global Delaunay triangulation.
    pub fn triangulate(&self, pts: &PointArray, tree: &DomainTree) -> Result<Triangulation> {
        self.triangulate_with_stats(pts, tree).map(|(t, _)| t)
    }

    pub fn triangulate_with_stats(
        &self,
        pts: &PointArray,
        tree: &DomainTree,
    ) -> Result<(Triangulation, ExchangeStats)> {
        match self.run(Task::Triangulate, pts, tree)? {
            (RunOutput::Tess(t), stats) => Ok((t, stats)),
            _ => unreachable!("triangulate task produced volume output"),
        }
    }

    /// Compute the Voronoi cell volume of every input point, in input
    /// order; `-1.0` marks unbounded cells.
    pub fn voronoi_volumes(&self, pts: &PointArray, tree: &DomainTree) -> Result<Vec<f64>> {
        self.voronoi_volumes_with_stats(pts, tree).map(|(v, _)| v)
    }

    pub fn voronoi_volumes_with_stats(
        &self,
        pts: &PointArray,
        tree: &DomainTree,
    ) -> Result<(Vec<f64>, ExchangeStats)> {
        match self.run(Task::Volumes, pts, tree)? {
            (RunOutput::Vols(v), stats) => Ok((v, stats)),
            _ => unreachable!("volumes task produced triangulation output"),
        }
    }

    fn validate(&self, pts: &PointArray, tree: &DomainTree) -> Result<()> {
        if self.nproc == 0 {
            return Err(Error::Config("number of processes must be positive".into()));
        }
        if tree.dim() != pts.dim() {
            return Err(Error::Config(format!(
                "tree dimension {} does not match point dimension {}",
                tree.dim(),
                pts.dim()
            )));
        }
        if tree.idx.len() != pts.len() {
            return Err(Error::Config(format!(
                "permutation covers {} points but the array has {}",
                tree.idx.len(),
                pts.len()
            )));
        }
        if tree.num_leaves() == 0 {
            return Err(Error::Config("decomposition has no leaves".into()));
        }
        Ok(())
    }

    fn run(
        &self,
        task: Task,
        pts: &PointArray,
        tree: &DomainTree,
    ) -> Result<(RunOutput, ExchangeStats)> {
        self.validate(pts, tree)?;
        let nproc = self.nproc;
        let num_leaves = tree.num_leaves();
        let dim = pts.dim();
        info!(
            "running {task:?} over {} points, {num_leaves} leaves, {nproc} processes",
            pts.len()
        );

        let all_le: Vec<[f64; 3]> = tree.leaves.iter().map(|l| l.left_edge).collect();
        let all_re: Vec<[f64; 3]> = tree.leaves.iter().map(|l| l.right_edge).collect();

        // Partition workers, grouped by owning process before any thread
        // starts so construction errors stay synchronous.
        let mut proc_workers: Vec<Vec<PartitionWorker>> = (0..nproc).map(|_| Vec::new()).collect();
        for leaf in &tree.leaves {
            let worker = PartitionWorker::new(leaf.clone(), dim, &all_le, &all_re)?;
            proc_workers[leaf.id % nproc].push(worker);
        }

        let mut mail_senders = Vec::with_capacity(nproc);
        let mut mail_receivers = Vec::with_capacity(nproc);
        for _ in 0..nproc {
            let (tx, rx) = unbounded();
            mail_senders.push(tx);
            mail_receivers.push(rx);
        }
        let mut out_senders = Vec::with_capacity(num_leaves);
        let mut out_receivers = Vec::with_capacity(num_leaves);
        for _ in 0..num_leaves {
            let (tx, rx) = unbounded::<Vec<u8>>();
            out_senders.push(tx);
            out_receivers.push(rx);
        }

        let term = TerminationState::new(nproc);

        let output = std::thread::scope(|s| {
            let mut handles = Vec::with_capacity(nproc);
            for (proc_idx, workers) in proc_workers.into_iter().enumerate() {
                let inbox = mail_receivers.remove(0);
                let senders = mail_senders.clone();
                let outs: Vec<_> = workers
                    .iter()
                    .map(|w| out_senders[w.id()].clone())
                    .collect();
                let term = &term;
                let idx = &tree.idx;
                handles.push(s.spawn(move || {
                    let mut coord = ExchangeCoordinator::new(
                        proc_idx, nproc, num_leaves, workers, pts, idx, senders, inbox, term,
                    );
                    let result = coord.run(task, &outs);
                    if result.is_err() {
                        term.abort();
                    }
                    result
                }));
            }
            // The master must not hold live sender halves: channel
            // disconnects are how worker death is observed.
            drop(mail_senders);
            drop(out_senders);

            let drained = match task {
                Task::Triangulate => self.drain_triangulation(pts, tree, &out_receivers, &term),
                Task::Volumes => self.drain_volumes(pts, tree, &out_receivers, &term),
            };
            if drained.is_err() {
                term.abort();
            }

            let mut worker_err: Option<Error> = None;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(())) | Ok(Err(Error::Aborted)) => {}
                    Ok(Err(e)) => {
                        if worker_err.is_none() {
                            worker_err = Some(e);
                        }
                    }
                    Err(_) => {
                        if worker_err.is_none() {
                            worker_err = Some(Error::Protocol("worker thread panicked".into()));
                        }
                    }
                }
            }
            match worker_err {
                Some(e) => Err(e),
                None => drained,
            }
        })?;

        let stats = ExchangeStats::new(term.rounds_log());
        debug!("exchange statistics: {:?}", stats.rounds);
        Ok((output, stats))
    }

    fn drain_triangulation(
        &self,
        pts: &PointArray,
        tree: &DomainTree,
        receivers: &[Receiver<Vec<u8>>],
        term: &TerminationState,
    ) -> Result<RunOutput> {
        let num_leaves = tree.num_leaves();
        let mut decoders: Vec<TriangulationDecoder> = (0..num_leaves)
            .map(|l| TriangulationDecoder::new(pts.dim(), l as u64))
            .collect();
        let mut serialized: Vec<Option<SerializedLeaf>> = vec![None; num_leaves];
        self.poll_channels(receivers, term, |l, frame| {
            Ok(decoders[l].push(frame)?.map(|sl| serialized[l] = Some(sl)).is_some())
        })?;

        let leaves: Vec<SerializedLeaf> =
            serialized.into_iter().map(Option::unwrap).collect();
        let starts: Vec<u64> = tree.leaves.iter().map(|l| l.start_idx as u64).collect();
        let stops: Vec<u64> = tree.leaves.iter().map(|l| l.stop_idx as u64).collect();
        let (cells, neighbors, inf) = consolidate_leaves(
            pts.dim(),
            &leaves,
            &starts,
            &stops,
            pts.len(),
            self.use_double,
        )?;
        let tess = Triangulation::deserialize_with_info(pts, &tree.idx, &cells, &neighbors, inf)?;
        Ok(RunOutput::Tess(tess))
    }

    fn drain_volumes(
        &self,
        pts: &PointArray,
        tree: &DomainTree,
        receivers: &[Receiver<Vec<u8>>],
        term: &TerminationState,
    ) -> Result<RunOutput> {
        let mut decoders: Vec<VolumesDecoder> = tree
            .leaves
            .iter()
            .map(|l| VolumesDecoder::new(l.id as u64, l.npts()))
            .collect();
        let mut vol = vec![0.0f64; pts.len()];
        self.poll_channels(receivers, term, |l, frame| {
            if let Some(leaf_vols) = decoders[l].push(frame)? {
                let leaf = &tree.leaves[l];
                for (j, v) in leaf_vols.into_iter().enumerate() {
                    vol[tree.idx[leaf.start_idx + j] as usize] = v;
                }
                return Ok(true);
            }
            Ok(false)
        })?;
        Ok(RunOutput::Vols(vol))
    }

    /// Non-blocking round-robin poll over every worker channel until each
    /// has produced its complete result (`on_frame` returns true).
    fn poll_channels(
        &self,
        receivers: &[Receiver<Vec<u8>>],
        term: &TerminationState,
        mut on_frame: impl FnMut(usize, &[u8]) -> Result<bool>,
    ) -> Result<()> {
        let mut complete = vec![false; receivers.len()];
        let mut remaining = receivers.len();
        while remaining > 0 {
            let mut progressed = false;
            for (l, rx) in receivers.iter().enumerate() {
                if complete[l] {
                    continue;
                }
                loop {
                    match rx.try_recv() {
                        Ok(frame) => {
                            progressed = true;
                            if on_frame(l, &frame)? {
                                complete[l] = true;
                                remaining -= 1;
                                break;
                            }
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            return Err(Error::Protocol(format!(
                                "worker channel of leaf {l} closed before its result"
                            )));
                        }
                    }
                }
            }
            if !progressed {
                if term.aborted() {
                    return Err(Error::Aborted);
                }
                std::thread::yield_now();
            }
        }
        Ok(())
    }
}
