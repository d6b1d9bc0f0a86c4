use super::{BudgetKind, CancelHandle, SolveOutcome, Solver};
use crate::common::{Constraints, HighLevelNode};
use crate::config::Config;
use crate::stat::Stats;
use crate::world::World;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Baseline Conflict-Based Search.
pub struct CBS {
    world: Arc<World>,
    stats: Stats,
    cancel: CancelHandle,
}

impl CBS {
    pub fn new(world: impl Into<Arc<World>>) -> Self {
        CBS {
            world: world.into(),
            stats: Stats::default(),
            cancel: CancelHandle::new(),
        }
    }

    /// Handle that aborts the running search, or the next one if none is
    /// running. The flag clears once that search returns.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Same search as [`Solver::solve`], run on a blocking task off the async
    /// executor. With `concurrent_root` the root agents are planned in
    /// parallel first.
    pub async fn solve_async(&mut self, config: &Config) -> SolveOutcome {
        let total_solve_start_time = Instant::now();
        let mut stats = Stats::default();

        let mut concurrent_root = None;
        if config.concurrent_root {
            let store = vec![Constraints::new(); self.world.agents().len()];
            let paths = Arc::clone(&self.world)
                .build_joint_solution_concurrent(Arc::new(store.clone()), config, &mut stats)
                .await;
            match paths {
                Some(paths) => concurrent_root = Some(HighLevelNode::from_parts(store, paths)),
                None => {
                    let outcome = search(
                        &self.world,
                        config,
                        &self.cancel,
                        None,
                        total_solve_start_time,
                        &mut stats,
                    );
                    self.stats = stats;
                    self.cancel.reset();
                    return outcome;
                }
            }
        }

        let world = Arc::clone(&self.world);
        let config = config.clone();
        let cancel = self.cancel.clone();
        let task = tokio::task::spawn_blocking(move || {
            let root =
                concurrent_root.or_else(|| HighLevelNode::new(&world, &config, &mut stats));
            let outcome = search(
                &world,
                &config,
                &cancel,
                root,
                total_solve_start_time,
                &mut stats,
            );
            (outcome, stats)
        });

        let outcome = match task.await {
            Ok((outcome, stats)) => {
                self.stats = stats;
                outcome
            }
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => {
                warn!("search task stopped: {err}");
                SolveOutcome::BudgetExhausted(BudgetKind::Cancelled)
            }
        };
        self.cancel.reset();
        outcome
    }
}

impl Solver for CBS {
    fn solve(&mut self, config: &Config) -> SolveOutcome {
        let total_solve_start_time = Instant::now();
        self.stats = Stats::default();

        let root = HighLevelNode::new(&self.world, config, &mut self.stats);
        let outcome = search(
            &self.world,
            config,
            &self.cancel,
            root,
            total_solve_start_time,
            &mut self.stats,
        );
        self.cancel.reset();
        outcome
    }
}

/// Open and closed collections of the constraint tree.
struct ConstraintTree {
    // Keyed by (cost, insertion order): equal costs pop first-in first-out.
    open: BTreeMap<(usize, usize), HighLevelNode>,
    // Node identity is the full constraint store.
    closed: HashSet<Vec<Constraints>>,
    serial: usize,
}

impl ConstraintTree {
    fn new() -> Self {
        ConstraintTree {
            open: BTreeMap::new(),
            closed: HashSet::new(),
            serial: 0,
        }
    }

    /// Queues `node` unless its constraint store was already expanded.
    fn push(&mut self, node: HighLevelNode, stats: &mut Stats) -> bool {
        if self.closed.contains(&node.constraints) {
            debug!("constraint set already expanded, drop node");
            stats.duplicate_nodes += 1;
            return false;
        }
        self.serial += 1;
        stats.high_level_generated_nodes += 1;
        self.open.insert((node.cost, self.serial), node);
        true
    }

    /// Cheapest queued node whose constraint store is new; marks it expanded.
    fn pop(&mut self, stats: &mut Stats) -> Option<HighLevelNode> {
        while let Some((_, node)) = self.open.pop_first() {
            if self.closed.insert(node.constraints.clone()) {
                return Some(node);
            }
            debug!("skip already expanded constraint set");
            stats.duplicate_nodes += 1;
        }
        None
    }
}

/// Runs the search from `root`; a missing root means the unconstrained
/// joint plan already failed.
fn search(
    world: &World,
    config: &Config,
    cancel: &CancelHandle,
    root: Option<HighLevelNode>,
    total_solve_start_time: Instant,
    stats: &mut Stats,
) -> SolveOutcome {
    let outcome = match root {
        Some(root) => expand(world, config, cancel, root, total_solve_start_time, stats),
        None => {
            debug!("root node has no joint solution");
            SolveOutcome::NoSolution
        }
    };
    stats.time_us = total_solve_start_time.elapsed().as_micros() as usize;
    outcome
}

/// Best-first expansion of the constraint tree starting at `root`.
fn expand(
    world: &World,
    config: &Config,
    cancel: &CancelHandle,
    root: HighLevelNode,
    total_solve_start_time: Instant,
    stats: &mut Stats,
) -> SolveOutcome {
    let time_limit = config.time_limit();
    let mut tree = ConstraintTree::new();
    tree.push(root, stats);

    loop {
        if cancel.is_cancelled() {
            warn!("search cancelled");
            return SolveOutcome::BudgetExhausted(BudgetKind::Cancelled);
        }
        if let Some(limit) = time_limit {
            if total_solve_start_time.elapsed() >= limit {
                warn!("time limit of {limit:?} reached");
                return SolveOutcome::BudgetExhausted(BudgetKind::TimeLimit(limit));
            }
        }
        if let Some(limit) = config.max_high_level_nodes {
            if stats.high_level_expand_nodes >= limit {
                warn!("high-level node budget of {limit} reached");
                return SolveOutcome::BudgetExhausted(BudgetKind::HighLevelNodes(limit));
            }
        }

        let Some(current_node) = tree.pop(stats) else {
            debug!("open list exhausted");
            return SolveOutcome::NoSolution;
        };
        stats.high_level_expand_nodes += 1;

        let Some(conflict) = world.first_conflict(&current_node.paths) else {
            // No conflicts, return solution.
            stats.costs = current_node.cost;
            stats.time_us = total_solve_start_time.elapsed().as_micros() as usize;
            stats.print();
            return SolveOutcome::Solved(current_node.solution(world));
        };
        debug!(
            "conflict between agents {:?} and {:?}: {conflict:?}",
            world.agent_id(conflict.agent_1),
            world.agent_id(conflict.agent_2)
        );

        for (agent, constraint) in world.derive_constraints(&conflict) {
            match current_node.update_constraint(agent, &constraint, world, config, stats) {
                Some(child) => {
                    tree.push(child, stats);
                }
                None => {
                    debug!("prune branch constraining agent {:?}", world.agent_id(agent));
                    stats.pruned_branches += 1;
                }
            }
        }
    }
}
