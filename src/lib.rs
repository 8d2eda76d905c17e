pub mod bridge;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod prompts;
pub mod session;
pub mod tui;
pub mod ui;

pub use bridge::{EmbedBridge, EmbedSignal, HostWindow};
pub use config::Config;
pub use error::{CommunicationError, ConfigurationError};
pub use llm::{CompletionBackend, GeminiClient};
pub use session::{ConversationSession, SessionSnapshot, SubmitOutcome, TurnOutcome};
