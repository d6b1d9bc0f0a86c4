use crate::common::Position;

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    Goal,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => write!(f, "start"),
            Endpoint::Goal => write!(f, "goal"),
        }
    }
}

/// Rejected world descriptions. Raised before any search starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("grid must have a positive size, got {width}x{height}")]
    EmptyGrid { width: usize, height: usize },

    #[error("obstacle {0:?} lies outside the grid")]
    ObstacleOutOfBounds(Position),

    #[error("agent id {0} is used more than once")]
    DuplicateAgent(usize),

    #[error("agent {agent} {endpoint} {position:?} lies outside the grid")]
    OutOfBounds {
        agent: usize,
        endpoint: Endpoint,
        position: Position,
    },

    #[error("agent {agent} {endpoint} {position:?} is an obstacle")]
    OnObstacle {
        agent: usize,
        endpoint: Endpoint,
        position: Position,
    },

    /// Two agents with the same start or goal cell. Such an instance has no
    /// conflict-free plan; it is rejected here instead of being searched.
    #[error("agents {first} and {second} share the {endpoint} cell {position:?}")]
    SharedCell {
        first: usize,
        second: usize,
        endpoint: Endpoint,
        position: Position,
    },
}
