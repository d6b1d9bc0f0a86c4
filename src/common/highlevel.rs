use super::{flowtime, Constraints, Path, Position, Solution};
use crate::config::Config;
use crate::stat::Stats;
use crate::world::World;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConflictType {
    /// Both agents on `position` at the conflict time.
    Vertex { position: Position },
    /// Agents swap cells between the conflict time and the next tick.
    /// `from` and `to` are the cells of `agent_1`.
    Edge { from: Position, to: Position },
}

/// First clash found between two agents of a joint solution. Agents are
/// indices into [`World::agents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Conflict {
    pub agent_1: usize,
    pub agent_2: usize,
    pub time_step: usize,
    pub conflict_type: ConflictType,
}

/// Constraint tree node: per-agent constraint sets, the paths planned under
/// them, and their flowtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighLevelNode {
    pub constraints: Vec<Constraints>,
    pub paths: Vec<Path>,
    pub cost: usize,
}

impl HighLevelNode {
    /// Root node: every agent planned with no constraints.
    pub fn new(world: &World, config: &Config, stats: &mut Stats) -> Option<Self> {
        let constraints = vec![Constraints::new(); world.agents().len()];
        let paths = world.build_joint_solution(&constraints, config, stats)?;

        let start = Self::from_parts(constraints, paths);
        debug!("High level start node {start:?}");
        Some(start)
    }

    pub(crate) fn from_parts(constraints: Vec<Constraints>, paths: Vec<Path>) -> Self {
        let cost = flowtime(&paths);
        HighLevelNode {
            constraints,
            paths,
            cost,
        }
    }

    /// Child node that adds `constraint` to `agent` and replans that agent
    /// only. `None` when the constraint is already known or the agent has no
    /// path under it.
    pub fn update_constraint(
        &self,
        agent: usize,
        constraint: &Constraints,
        world: &World,
        config: &Config,
        stats: &mut Stats,
    ) -> Option<HighLevelNode> {
        let mut new_constraints = self.constraints.clone();
        let agent_constraints = new_constraints.get_mut(agent)?;
        if !agent_constraints.add_constraint(constraint) {
            debug!(
                "constraint {constraint:?} already applies to agent {:?}",
                world.agent_id(agent)
            );
            return None;
        }

        let new_path = world.plan_agent(agent, agent_constraints, config, stats)?;
        debug!("Update agent {:?} with path {new_path:?}", world.agent_id(agent));

        let mut new_paths = self.paths.clone();
        let new_cost = self.cost + new_path.len() - new_paths[agent].len();
        new_paths[agent] = new_path;

        Some(HighLevelNode {
            constraints: new_constraints,
            paths: new_paths,
            cost: new_cost,
        })
    }

    pub fn solution(&self, world: &World) -> Solution {
        Solution::from_paths(world, &self.paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Agent;

    // . # .
    // . . .
    fn bay_corridor() -> World {
        World::new(
            3,
            2,
            [Position::new(0, 1), Position::new(2, 1)],
            vec![
                Agent::new(0, (0, 0), (2, 0)),
                Agent::new(1, (2, 0), (0, 0)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_root_plans_every_agent_unconstrained() {
        let world = bay_corridor();
        let mut stats = Stats::default();
        let root = HighLevelNode::new(&world, &Config::default(), &mut stats).unwrap();

        assert_eq!(root.paths.len(), 2);
        assert!(root.constraints.iter().all(Constraints::is_empty));
        assert_eq!(root.cost, 6);
        assert!(stats.low_level_expand_nodes > 0);
    }

    #[test]
    fn test_child_only_grows_branched_agent() {
        let world = bay_corridor();
        let config = Config::default();
        let mut stats = Stats::default();
        let root = HighLevelNode::new(&world, &config, &mut stats).unwrap();

        let conflict = world.first_conflict(&root.paths).unwrap();
        for (agent, constraint) in world.derive_constraints(&conflict) {
            let child = root
                .update_constraint(agent, &constraint, &world, &config, &mut stats)
                .unwrap();

            assert!(child.constraints[agent].is_superset(&root.constraints[agent]));
            assert!(child.constraints[agent].len() > root.constraints[agent].len());

            let other = 1 - agent;
            assert_eq!(child.constraints[other], root.constraints[other]);
            assert_eq!(child.paths[other], root.paths[other]);

            assert_eq!(child.cost, flowtime(&child.paths));
            assert!(child.cost > root.cost);
        }
    }

    #[test]
    fn test_repeated_constraint_is_pruned() {
        let world = bay_corridor();
        let config = Config::default();
        let mut stats = Stats::default();
        let root = HighLevelNode::new(&world, &config, &mut stats).unwrap();

        let constraint = Constraints::from_vertex(1, Position::new(1, 0));
        let child = root
            .update_constraint(0, &constraint, &world, &config, &mut stats)
            .unwrap();
        assert!(child
            .update_constraint(0, &constraint, &world, &config, &mut stats)
            .is_none());
    }

    #[test]
    fn test_unknown_agent_is_pruned() {
        let world = bay_corridor();
        let config = Config::default();
        let mut stats = Stats::default();
        let root = HighLevelNode::new(&world, &config, &mut stats).unwrap();
        let constraint = Constraints::from_vertex(1, Position::new(1, 0));
        assert!(root
            .update_constraint(5, &constraint, &world, &config, &mut stats)
            .is_none());
    }
}
