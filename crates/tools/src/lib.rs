pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod pipeline;

pub use config::SynthConfig;
pub use error::ToolError;
pub use pipeline::{Synthesis, run};
