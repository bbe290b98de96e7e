//! The per-process exchange loop and the global termination detector.
//!
//! Every process runs one [`ExchangeCoordinator`] serially over its
//! assigned partition workers (assignment: `leaf.id mod P`). A round is
//! `{send halo, receive halo, barrier + vote}`:
//!
//! - **send**: for every local worker, one message per target leaf in
//!   ascending id order -- an explicit [`Message::Empty`] where there is
//!   no payload -- pushed onto the mailbox of the process owning the
//!   target. Per-producer FIFO on the mailbox plus the exact-count
//!   receive below keep rounds from bleeding into each other.
//! - **receive**: exactly `L x (#local workers)` pops; non-empty payloads
//!   are routed to the target worker and counted.
//! - **vote**: all processes meet in [`TerminationState::vote_and_wait`];
//!   the round that moves zero points globally is the last one.
//!
//! After convergence each worker's serialized result goes out on its
//! dedicated output channel, followed by one final barrier.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info};

use crate::engine::Task;
use crate::error::{Error, Result};
use crate::partition::PartitionWorker;
use crate::points::PointArray;
use crate::wire::{Message, encode_volumes};

const ABORT_POLL: Duration = Duration::from_millis(50);

#[derive(Default)]
struct TermInner {
    arrived: usize,
    received: u64,
    done: bool,
    aborted: bool,
    round: u64,
    rounds_log: Vec<u64>,
    barrier_arrived: usize,
    barrier_round: u64,
}

/// The shared `(arrived, nonzero, done)` triple of the termination
/// protocol, guarded by a single lock/condvar pair. The process whose vote
/// completes a round is the leader: it records the round's global total,
/// sets `done` when that total is zero, resets the counters and wakes
/// everyone.
pub struct TerminationState {
    inner: Mutex<TermInner>,
    cond: Condvar,
    nproc: usize,
}

impl TerminationState {
    pub fn new(nproc: usize) -> Self {
        Self { inner: Mutex::new(TermInner::default()), cond: Condvar::new(), nproc }
    }

    /// True while another exchange round should run.
    pub fn enter_round(&self) -> bool {
        let g = self.inner.lock().unwrap();
        !g.done && !g.aborted
    }

    /// True once the exchange has reached its fixed point.
    pub fn finished(&self) -> bool {
        self.inner.lock().unwrap().done
    }

    pub fn aborted(&self) -> bool {
        self.inner.lock().unwrap().aborted
    }

    /// Barrier + vote at the end of a round. `received` is the number of
    /// points this process ingested during the round.
    pub fn vote_and_wait(&self, received: u64) -> Result<()> {
        let mut g = self.inner.lock().unwrap();
        if g.aborted {
            return Err(Error::Aborted);
        }
        g.arrived += 1;
        g.received += received;
        if g.arrived == self.nproc {
            let total = g.received;
            g.rounds_log.push(total);
            if total == 0 {
                g.done = true;
            }
            g.arrived = 0;
            g.received = 0;
            g.round += 1;
            debug!("exchange round {} moved {} points", g.rounds_log.len(), total);
            self.cond.notify_all();
        } else {
            let round = g.round;
            while g.round == round && !g.aborted {
                g = self.cond.wait(g).unwrap();
            }
            if g.aborted {
                return Err(Error::Aborted);
            }
        }
        Ok(())
    }

    /// Plain barrier, used once after the results have been emitted.
    pub fn barrier(&self) -> Result<()> {
        let mut g = self.inner.lock().unwrap();
        if g.aborted {
            return Err(Error::Aborted);
        }
        g.barrier_arrived += 1;
        if g.barrier_arrived == self.nproc {
            g.barrier_arrived = 0;
            g.barrier_round += 1;
            self.cond.notify_all();
        } else {
            let round = g.barrier_round;
            while g.barrier_round == round && !g.aborted {
                g = self.cond.wait(g).unwrap();
            }
            if g.aborted {
                return Err(Error::Aborted);
            }
        }
        Ok(())
    }

    /// Fail-fast poison: wake every waiter and make all further calls
    /// return [`Error::Aborted`].
    pub fn abort(&self) {
        let mut g = self.inner.lock().unwrap();
        g.aborted = true;
        self.cond.notify_all();
    }

    /// Global received-point totals per round, as recorded by the leaders.
    pub fn rounds_log(&self) -> Vec<u64> {
        self.inner.lock().unwrap().rounds_log.clone()
    }
}

/// One process of the exchange: drives the local workers through the
/// round loop and emits their results.
pub struct ExchangeCoordinator<'a> {
    proc_idx: usize,
    nproc: usize,
    num_leaves: usize,
    workers: Vec<PartitionWorker>,
    pts: &'a PointArray,
    idx: &'a [u64],
    mailboxes: Vec<Sender<Message>>,
    inbox: Receiver<Message>,
    term: &'a TerminationState,
}

impl<'a> ExchangeCoordinator<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        proc_idx: usize,
        nproc: usize,
        num_leaves: usize,
        workers: Vec<PartitionWorker>,
        pts: &'a PointArray,
        idx: &'a [u64],
        mailboxes: Vec<Sender<Message>>,
        inbox: Receiver<Message>,
        term: &'a TerminationState,
    ) -> Self {
        Self { proc_idx, nproc, num_leaves, workers, pts, idx, mailboxes, inbox, term }
    }

    /// Run the whole exchange on this process and emit the per-worker
    /// results on `outputs` (one channel per local worker, local order).
    pub fn run(&mut self, task: Task, outputs: &[Sender<Vec<u8>>]) -> Result<()> {
        for w in &mut self.workers {
            w.tessellate(self.pts, self.idx)?;
        }
        let mut rounds = 0usize;
        while self.term.enter_round() {
            self.send_round()?;
            let received = self.recv_round()?;
            rounds += 1;
            self.term.vote_and_wait(received)?;
        }
        info!(
            "process {} converged after {} rounds ({} workers)",
            self.proc_idx,
            rounds,
            self.workers.len()
        );
        for (w, out) in self.workers.iter().zip(outputs) {
            let frames = match task {
                Task::Triangulate => w.serialize()?.encode(),
                Task::Volumes => encode_volumes(w.id() as u64, &w.voronoi_volumes()?),
            };
            for frame in frames {
                out.send(frame)
                    .map_err(|_| Error::Protocol("output channel closed by master".into()))?;
            }
        }
        self.term.barrier()
    }

    fn send_round(&mut self) -> Result<()> {
        for wi in 0..self.workers.len() {
            let source = self.workers[wi].id();
            let (mut sendmap, nbr_ids, nbr_le, nbr_re) = self.workers[wi].outgoing_points();
            for target in 0..self.num_leaves {
                let msg = match sendmap[target].take() {
                    Some(indices) => Message::Points {
                        target,
                        source,
                        indices,
                        nbr_ids: nbr_ids.clone(),
                        nbr_le: nbr_le.clone(),
                        nbr_re: nbr_re.clone(),
                    },
                    None => Message::Empty,
                };
                self.mailboxes[target % self.nproc]
                    .send(msg)
                    .map_err(|_| Error::Protocol("mailbox closed mid-exchange".into()))?;
            }
        }
        Ok(())
    }

    fn recv_round(&mut self) -> Result<u64> {
        let expected = self.num_leaves * self.workers.len();
        let mut received = 0u64;
        for _ in 0..expected {
            let msg = loop {
                match self.inbox.recv_timeout(ABORT_POLL) {
                    Ok(msg) => break msg,
                    Err(RecvTimeoutError::Timeout) => {
                        if self.term.aborted() {
                            return Err(Error::Aborted);
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(Error::Protocol("mailbox drained below expected count".into()));
                    }
                }
            };
            let Message::Points { target, source, indices, nbr_ids, nbr_le, nbr_re } = msg else {
                continue;
            };
            if indices.is_empty() {
                continue;
            }
            let worker = self
                .workers
                .iter_mut()
                .find(|w| w.id() == target)
                .ok_or_else(|| {
                    Error::Protocol(format!(
                        "message for leaf {target} landed on process {}",
                        self.proc_idx
                    ))
                })?;
            let mut positions = Vec::with_capacity(indices.len() * self.pts.dim());
            for &g in &indices {
                positions.extend_from_slice(self.pts.row(self.idx[g as usize] as usize));
            }
            received += indices.len() as u64;
            worker.incoming_points(source, &indices, &nbr_ids, &nbr_le, &nbr_re, positions)?;
        }
        Ok(received)
    }
}
