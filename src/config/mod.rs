pub mod evolution;
pub mod manager;
pub mod risk;
pub mod scheduler;
pub mod sources;
pub mod traits;

pub use evolution::{CrossoverMethod, EvolutionConfig};
pub use manager::AppConfig;
pub use risk::RiskConfig;
pub use scheduler::SchedulerConfig;
pub use sources::{DataConfig, StorageConfig};
pub use traits::ConfigSection;
