pub mod registry;
pub mod supervisor;
pub mod sweeper;
pub mod task_queue;
pub mod types;

pub use supervisor::PoolSupervisor;
pub use sweeper::{SweepEntry, SweepReport, SweepStatus};
pub use types::{SanitizedWorker, WorkerRecord, WorkerState};
