pub mod bot_actor;
pub mod bot_handle;
pub mod commands;
pub mod cycle;
pub mod events;

pub use bot_actor::BotActor;
pub use bot_handle::BotHandle;
pub use commands::{BotCommand, BotState, BotStatus};
pub use cycle::{CycleOrchestrator, CycleReport, CycleState, StageFailure};
pub use events::BotEvent;
