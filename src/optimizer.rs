//! Focus search optimizer
//!
//! Runs bounded repeated trials of the focus strategy, tracks the trial with
//! the fewest total forwards, and extends the budget once when every primary
//! trial comes back infeasible. Trials are independent given a reset world,
//! so batches run in parallel; each trial derives its own RNG stream from
//! the root seed, keeping the search reproducible regardless of scheduling.

use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::alloc::{focus, AllocationResult};
use crate::config::SimConfig;
use crate::interest::{self, CostModel, EvalError};
use crate::util::vec2::Vec2;
use crate::world::World;

/// Extra trials granted once when every primary trial is infeasible
pub const RETRY_BUDGET: u32 = 10;

/// Search errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("search budget produced no trials")]
    NoTrials,
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Everything recorded about one focus trial, enough to reconstruct it
#[derive(Debug, Clone, Serialize)]
pub struct TrialRecord {
    pub index: u32,
    pub result: AllocationResult,
    /// Focus point per server, indexed by server id
    pub focus_points: Vec<Vec2>,
    /// Occupancy per server at the end of the trial
    pub player_counts: Vec<u32>,
    pub elapsed: Duration,
}

/// Outcome of a full focus search
#[derive(Debug, Clone, Serialize)]
pub struct FocusSearchOutcome {
    pub best: TrialRecord,
    /// Every trial that ran, in index order
    pub trials: Vec<TrialRecord>,
    /// True when the retry extension was used
    pub extended: bool,
    pub total_elapsed: Duration,
}

/// Decision taken after the primary trial batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchStep {
    RetryExtended,
    Done,
}

/// Bounded stochastic search over focus allocations
pub struct FocusOptimizer<'a> {
    config: &'a SimConfig,
    cost: CostModel,
    root_seed: u64,
    deadline: Option<Instant>,
}

impl<'a> FocusOptimizer<'a> {
    pub fn new(config: &'a SimConfig, cost: CostModel, root_seed: u64) -> Self {
        Self {
            config,
            cost,
            root_seed,
            deadline: None,
        }
    }

    /// Bound the search by a wall-clock deadline, checked between trial
    /// batches (a running batch is never interrupted)
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run the search over a canonical snapshot
    ///
    /// Returns a world restored to the best trial's assignment plus the full
    /// trial log. The best trial is the one with the lowest total forward
    /// count, ties going to the earlier trial; feasibility is reported on
    /// every record but does not disqualify a trial from being best.
    pub fn run(&self, snapshot: &World) -> Result<(World, FocusSearchOutcome), SearchError> {
        let started = Instant::now();

        let mut base = snapshot.clone();
        base.reset_allocations();
        // Neighbor sets depend only on positions, so one computation is
        // shared by every trial
        let player_index = base.build_player_index();
        interest::compute_neighbors(&mut base, &player_index, self.config.viewable_players);

        let mut trials = self.run_batch(&base, 0, self.config.number_of_tries)?;
        let mut extended = false;

        if self.next_step(&trials) == SearchStep::RetryExtended && !self.deadline_passed() {
            info!(
                "All {} trials infeasible, extending search by {} tries",
                trials.len(),
                RETRY_BUDGET
            );
            extended = true;
            let extra = self.run_batch(&base, self.config.number_of_tries, RETRY_BUDGET)?;
            trials.extend(extra);
        }

        let best = trials
            .iter()
            .min_by_key(|trial| (trial.result.total_forwards, trial.index))
            .cloned()
            .ok_or(SearchError::NoTrials)?;

        let mut world = base;
        world.apply_assignment(&best.result.assignment, Some(&best.focus_points));

        info!(
            "Best focus trial {} of {}: {} forwards, feasible: {}",
            best.index,
            trials.len(),
            best.result.total_forwards,
            best.result.feasible
        );

        let outcome = FocusSearchOutcome {
            best,
            trials,
            extended,
            total_elapsed: started.elapsed(),
        };
        Ok((world, outcome))
    }

    fn run_batch(
        &self,
        base: &World,
        first_index: u32,
        count: u32,
    ) -> Result<Vec<TrialRecord>, SearchError> {
        (first_index..first_index + count)
            .into_par_iter()
            .map(|index| self.run_trial(base, index))
            .collect()
    }

    fn run_trial(&self, base: &World, index: u32) -> Result<TrialRecord, SearchError> {
        let started = Instant::now();
        let seed = trial_seed(self.root_seed, index);

        let mut world = base.clone();
        world.reset_allocations();
        let mut rng = SmallRng::seed_from_u64(seed);
        focus::allocate(&mut world, &mut rng);
        let result = interest::evaluate(&mut world, &self.cost, seed)?;

        let focus_points = world
            .servers
            .iter()
            .map(|server| server.position.unwrap_or(Vec2::ZERO))
            .collect();
        let player_counts = world.servers.iter().map(|server| server.player_count).collect();

        debug!(
            "Trial {}: {} forwards, feasible: {}",
            index, result.total_forwards, result.feasible
        );

        Ok(TrialRecord {
            index,
            result,
            focus_points,
            player_counts,
            elapsed: started.elapsed(),
        })
    }

    fn next_step(&self, trials: &[TrialRecord]) -> SearchStep {
        if !trials.is_empty() && trials.iter().all(|trial| !trial.result.feasible) {
            SearchStep::RetryExtended
        } else {
            SearchStep::Done
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
    }
}

/// Derive an independent RNG stream for one trial (splitmix-style mix so
/// consecutive trial indexes do not produce correlated streams)
fn trial_seed(root: u64, trial: u32) -> u64 {
    let mut z = root.wrapping_add(0x9E37_79B9_7F4A_7C15u64.wrapping_mul(trial as u64 + 1));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
