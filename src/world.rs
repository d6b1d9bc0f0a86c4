use crate::algorithm::a_star_search;
use crate::common::{state_at, Agent, Conflict, ConflictType, Constraints, Path, Position};
use crate::config::Config;
use crate::error::{Endpoint, WorldError};
use crate::solver::CancelHandle;
use crate::stat::Stats;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Tile {
    passable: bool,
    neighbors: Vec<Position>, // Wait first, then up, down, left, right.
}

/// Static description of one MAPF instance: grid bounds, obstacles and the
/// agents' start/goal cells. Never mutated once built.
#[derive(Debug, Clone)]
pub struct World {
    width: usize,
    height: usize,
    grid: Vec<Vec<Tile>>, // Indexed as grid[x][y].
    obstacles: HashSet<Position>,
    agents: Vec<Agent>,
}

impl World {
    pub fn new(
        width: usize,
        height: usize,
        obstacles: impl IntoIterator<Item = Position>,
        agents: Vec<Agent>,
    ) -> Result<Self, WorldError> {
        if width == 0 || height == 0 {
            return Err(WorldError::EmptyGrid { width, height });
        }

        let obstacles: HashSet<Position> = obstacles.into_iter().collect();
        let in_bounds = |position: &Position| position.x < width && position.y < height;
        if let Some(obstacle) = obstacles.iter().find(|obstacle| !in_bounds(obstacle)) {
            return Err(WorldError::ObstacleOutOfBounds(*obstacle));
        }

        let mut ids = HashSet::new();
        let mut starts: HashMap<Position, usize> = HashMap::new();
        let mut goals: HashMap<Position, usize> = HashMap::new();
        for agent in &agents {
            if !ids.insert(agent.id) {
                return Err(WorldError::DuplicateAgent(agent.id));
            }

            for (endpoint, position, seen) in [
                (Endpoint::Start, agent.start, &mut starts),
                (Endpoint::Goal, agent.goal, &mut goals),
            ] {
                if !in_bounds(&position) {
                    return Err(WorldError::OutOfBounds {
                        agent: agent.id,
                        endpoint,
                        position,
                    });
                }
                if obstacles.contains(&position) {
                    return Err(WorldError::OnObstacle {
                        agent: agent.id,
                        endpoint,
                        position,
                    });
                }
                if let Some(&first) = seen.get(&position) {
                    return Err(WorldError::SharedCell {
                        first,
                        second: agent.id,
                        endpoint,
                        position,
                    });
                }
                seen.insert(position, agent.id);
            }
        }

        let grid = (0..width)
            .map(|x| {
                (0..height)
                    .map(|y| Tile {
                        passable: !obstacles.contains(&Position::new(x, y)),
                        neighbors: Vec::new(),
                    })
                    .collect()
            })
            .collect();

        let mut world = World {
            width,
            height,
            grid,
            obstacles,
            agents,
        };
        world.initialize_neighbors();
        Ok(world)
    }

    fn initialize_neighbors(&mut self) {
        for x in 0..self.width {
            for y in 0..self.height {
                if self.grid[x][y].passable {
                    self.grid[x][y].neighbors = self.compute_neighbors(x, y);
                }
            }
        }
    }

    fn compute_neighbors(&self, x: usize, y: usize) -> Vec<Position> {
        let directions = [(0, 0), (0, 1), (0, -1), (-1, 0), (1, 0)]; // Stay, up, down, left, right
        let mut neighbors = Vec::new();

        for &(dx, dy) in &directions {
            let new_x = x as i64 + dx;
            let new_y = y as i64 + dy;
            if new_x >= 0
                && new_y >= 0
                && new_x < self.width as i64
                && new_y < self.height as i64
                && self.grid[new_x as usize][new_y as usize].passable
            {
                neighbors.push(Position::new(new_x as usize, new_y as usize));
            }
        }

        neighbors
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Caller-facing id of the agent at `index`.
    pub fn agent_id(&self, index: usize) -> Option<usize> {
        self.agents.get(index).map(|agent| agent.id)
    }

    pub fn obstacles(&self) -> &HashSet<Position> {
        &self.obstacles
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        position.x < self.width && position.y < self.height
    }

    pub fn is_passable(&self, position: Position) -> bool {
        self.grid
            .get(position.x)
            .and_then(|column| column.get(position.y))
            .is_some_and(|tile| tile.passable)
    }

    pub fn free_cells(&self) -> usize {
        self.width * self.height - self.obstacles.len()
    }

    /// Cells reachable in one tick from `position`, including staying put.
    /// Empty for obstacles and cells outside the grid.
    pub fn get_neighbors(&self, position: Position) -> &[Position] {
        self.grid
            .get(position.x)
            .and_then(|column| column.get(position.y))
            .map(|tile| tile.neighbors.as_slice())
            .unwrap_or(&[])
    }

    /// Shortest path for the agent at index `agent` under `constraints`.
    pub fn plan_agent(
        &self,
        agent: usize,
        constraints: &Constraints,
        config: &Config,
        stats: &mut Stats,
    ) -> Option<Path> {
        let agent = self.agents.get(agent)?;
        a_star_search(self, agent, constraints, config, stats)
    }

    /// Plans every agent under its entry of `store`. Fails as a whole if any
    /// agent has no path.
    pub fn build_joint_solution(
        &self,
        store: &[Constraints],
        config: &Config,
        stats: &mut Stats,
    ) -> Option<Vec<Path>> {
        let mut paths = Vec::with_capacity(self.agents.len());
        for (agent, constraints) in store.iter().enumerate().take(self.agents.len()) {
            match self.plan_agent(agent, constraints, config, stats) {
                Some(path) => paths.push(path),
                None => {
                    debug!("agent {} has no path", self.agents[agent].id);
                    return None;
                }
            }
        }
        (paths.len() == self.agents.len()).then_some(paths)
    }

    /// Same result as [`World::build_joint_solution`], with one blocking task
    /// per agent. Agents never observe each other's paths while planning.
    pub async fn build_joint_solution_concurrent(
        self: Arc<Self>,
        store: Arc<Vec<Constraints>>,
        config: &Config,
        stats: &mut Stats,
    ) -> Option<Vec<Path>> {
        if store.len() < self.agents.len() {
            return None;
        }

        // Blocking tasks keep running after `abort_all`; ones that have not
        // started yet see `stop` and skip their search.
        let stop = CancelHandle::new();
        let mut tasks = JoinSet::new();
        for agent in 0..self.agents.len() {
            let world = Arc::clone(&self);
            let store = Arc::clone(&store);
            let config = config.clone();
            let stop = stop.clone();
            tasks.spawn_blocking(move || {
                let mut local_stats = Stats::default();
                let path = if stop.is_cancelled() {
                    None
                } else {
                    world.plan_agent(agent, &store[agent], &config, &mut local_stats)
                };
                (agent, path, local_stats)
            });
        }

        let mut paths = vec![None; self.agents.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((agent, path, local_stats)) => {
                    stats.absorb(&local_stats);
                    match path {
                        Some(path) => paths[agent] = Some(path),
                        None => {
                            debug!("agent {} has no path", self.agents[agent].id);
                            stop.cancel();
                            tasks.abort_all();
                            return None;
                        }
                    }
                }
                Err(err) => {
                    warn!("planning task failed: {err}");
                    stop.cancel();
                    tasks.abort_all();
                    return None;
                }
            }
        }
        paths.into_iter().collect()
    }

    /// Earliest conflict in `paths`. At each tick vertex conflicts are checked
    /// for all agent pairs before swap conflicts; pairs follow agent order.
    pub fn first_conflict(&self, paths: &[Path]) -> Option<Conflict> {
        let max_length = paths.iter().map(Vec::len).max().unwrap_or(0);

        for time_step in 0..max_length {
            for i in 0..paths.len() {
                for j in (i + 1)..paths.len() {
                    let (Some(state_1), Some(state_2)) =
                        (state_at(&paths[i], time_step), state_at(&paths[j], time_step))
                    else {
                        continue;
                    };

                    if state_1.is_equal_except_time(state_2) {
                        return Some(Conflict {
                            agent_1: i,
                            agent_2: j,
                            time_step,
                            conflict_type: ConflictType::Vertex {
                                position: state_1.position,
                            },
                        });
                    }
                }
            }

            for i in 0..paths.len() {
                for j in (i + 1)..paths.len() {
                    let (Some(state_1a), Some(state_1b), Some(state_2a), Some(state_2b)) = (
                        state_at(&paths[i], time_step),
                        state_at(&paths[i], time_step + 1),
                        state_at(&paths[j], time_step),
                        state_at(&paths[j], time_step + 1),
                    ) else {
                        continue;
                    };

                    if state_1a.is_equal_except_time(state_2b)
                        && state_1b.is_equal_except_time(state_2a)
                    {
                        return Some(Conflict {
                            agent_1: i,
                            agent_2: j,
                            time_step,
                            conflict_type: ConflictType::Edge {
                                from: state_1a.position,
                                to: state_1b.position,
                            },
                        });
                    }
                }
            }
        }

        None
    }

    /// One constraint per agent of the conflict, each for its own branch.
    pub fn derive_constraints(&self, conflict: &Conflict) -> [(usize, Constraints); 2] {
        match conflict.conflict_type {
            ConflictType::Vertex { position } => {
                let constraint = Constraints::from_vertex(conflict.time_step, position);
                [
                    (conflict.agent_1, constraint.clone()),
                    (conflict.agent_2, constraint),
                ]
            }
            ConflictType::Edge { from, to } => [
                (
                    conflict.agent_1,
                    Constraints::from_edge(conflict.time_step, from, to),
                ),
                (
                    conflict.agent_2,
                    Constraints::from_edge(conflict.time_step, to, from),
                ),
            ],
        }
    }
}
