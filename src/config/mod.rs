//! Configuration module for Lectern.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{DescribePrompts, Prompts};
pub use settings::{
    DescriberProvider, DescriberSettings, FetchSettings, GeneralSettings, MediaSettings,
    PipelineSettings, PromptSettings, Settings, StoreSettings,
};
