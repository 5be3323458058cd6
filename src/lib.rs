pub mod chat;
pub mod config;
pub mod console;
pub mod error;
pub mod llm;
pub mod logger;

pub use chat::{ChatError, ChatSession, TurnOutcome};
pub use error::AppError;
