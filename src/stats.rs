//! Exchange statistics: what every round of the protocol moved.
//!
//! The termination leader records the global received-point total of each
//! round; the resulting series is both a convergence diagnostic and the
//! carrier of the protocol's soundness property -- once a round moves
//! nothing, every later round moves nothing. Stats can be printed or saved
//! as JSON for offline inspection.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Per-round global exchange totals for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeStats {
    /// Points received globally in each round, in round order. The final
    /// entry of a completed run is always zero.
    pub rounds: Vec<u64>,
}

impl ExchangeStats {
    pub fn new(rounds: Vec<u64>) -> Self {
        Self { rounds }
    }

    pub fn num_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Total points moved over the whole exchange.
    pub fn total_points(&self) -> u64 {
        self.rounds.iter().sum()
    }

    /// Monotone convergence: the run ended on a silent round and no round
    /// after the first silent one moved anything.
    pub fn is_monotone_converged(&self) -> bool {
        match self.rounds.iter().position(|&r| r == 0) {
            Some(first_zero) => self.rounds[first_zero..].iter().all(|&r| r == 0),
            None => false,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "rounds": self.rounds,
            "num_rounds": self.num_rounds(),
            "total_points": self.total_points(),
        })
    }

    /// Print a short report to stdout.
    pub fn print(&self) {
        println!("exchange: {} rounds, {} points moved", self.num_rounds(), self.total_points());
        for (i, r) in self.rounds.iter().enumerate() {
            println!("  round {}: {} points", i + 1, r);
        }
    }

    /// Save the JSON report to a file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(&self.to_json())?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
