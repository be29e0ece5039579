pub mod context;
pub mod failure;
pub mod role_pool;
pub mod subagent;
pub mod turn;

pub use failure::FailureTracker;
pub use role_pool::{RolePool, RolePoolPermit};
pub use subagent::{spawn, SpawnRequest};
pub use turn::{Runtime, TurnOutcome, TurnRequest, SPAWN_SUBAGENT_TOOL, USE_SKILL_TOOL};
