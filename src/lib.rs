pub mod agent;
pub mod audit;
pub mod config;
pub mod errors;
pub mod init;
pub mod logging;
pub mod markers;
pub mod orchestrator;
pub mod phase;
pub mod plan;
pub mod project_config;
pub mod prompts;
pub mod retry;
pub mod stream;
pub mod tracker;
pub mod ui;
