pub mod store;
pub mod tracker;
pub mod types;

pub use store::TaskStore;
pub use tracker::TaskTracker;
pub use types::{ProgressEntry, RunLink, Task, TaskPatch, TaskStatus};
