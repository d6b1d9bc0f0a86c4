mod algorithm;
pub mod common;
pub mod config;
pub mod error;
pub mod solver;
pub mod stat;
pub mod world;

pub use common::{Agent, Position, Solution, State};
pub use config::{Cli, Config};
pub use error::WorldError;
pub use solver::{BudgetKind, CancelHandle, SolveOutcome, Solver, CBS};
pub use world::World;
