pub mod batch;
pub mod credentials;
pub mod dispatcher;
pub mod export;
pub mod gemini;
pub mod prompt;
pub mod runner;
pub mod state_store;
pub mod upload;
