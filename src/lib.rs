pub mod app;
pub mod config;
pub mod controller;
pub mod downloads;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod state;
pub mod store;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use config::Config;
pub use controller::{InputController, RequestState, SkipReason, Submission};
pub use downloads::{DownloadDir, DownloadSink};
pub use error::AnalysisError;
pub use gateway::{AnalysisGateway, Artifact, CsvUpload, SentimentResult};
pub use state::{AnalysisMode, Message, MessageId, Role, Sentiment, SentimentMetadata};
pub use store::ConversationStore;
