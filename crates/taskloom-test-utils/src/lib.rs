//! Mocks and fixtures shared by taskloom tests.

pub mod agent;
pub mod fixtures;
pub mod model;
pub mod tools;

pub use agent::{FailingAgent, RecordingAgent};
pub use fixtures::{message_texts, test_config, write_config};
pub use model::MockModel;
pub use tools::{EchoTool, FailingTool, FileCountTool, SlowTool};
