pub mod engine;
pub mod memory;
pub mod message;
pub mod model;
pub mod store;

pub use engine::{
    CallOutcome, ConversationEngine, ConversationState, EngineContext, EngineSettings,
    IterationOutcome, IterationReport, StopReason, ToolCallRecord,
};
pub use memory::{MemoryManager, trim_history};
pub use message::{Message, Role};
pub use model::ModelClient;
pub use store::{ConversationStore, InMemoryStore, JsonFileStore};
