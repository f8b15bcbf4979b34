pub mod registry;
pub mod runner;
pub mod scheduler;

pub use registry::{ChampionRecord, ChampionRegistry, PromotionOutcome};
pub use runner::SchedulerRunner;
pub use scheduler::{AdaptiveScheduler, TickReport};
