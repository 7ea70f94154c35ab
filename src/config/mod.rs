//! Configuration module for vidquiz.
//!
//! Handles loading settings, credentials and prompt templates.

pub mod credentials;
mod prompts;
mod settings;

pub use credentials::Credentials;
pub use prompts::{DescribePrompts, Prompts, QuizPrompts};
pub use settings::{
    ApiSettings, AppSettings, DistanceMetric, LoggingSettings, PerformanceSettings,
    PromptSettings, QuizSettings, SecuritySettings, Settings, StoreSettings, ENV_PREFIX,
};
