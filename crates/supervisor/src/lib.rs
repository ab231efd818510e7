//! Process orchestration: restart policy, health reporting, and the
//! supervisor that wires collectors, queues and writers together.

pub mod health;
pub mod restart;
pub mod supervisor;

pub use health::{HealthReporter, QueueGauge};
pub use restart::{supervise, RestartPolicy, UnitState};
pub use supervisor::Supervisor;
