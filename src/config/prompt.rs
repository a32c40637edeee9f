use chrono::{ DateTime, Utc };

use crate::cli::Args;
use crate::models::chat::Turn;

/// Builds the system preamble. It is synthesized per request and never stored in history.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub include_timestamp: bool,
}

impl PromptConfig {
    pub fn new(system_prompt: impl Into<String>, include_timestamp: bool) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            include_timestamp,
        }
    }

    pub fn from_args(args: &Args) -> Self {
        Self::new(args.system_prompt.clone(), args.prompt_timestamp)
    }

    pub fn preamble(&self) -> Turn {
        self.preamble_at(Utc::now())
    }

    pub fn preamble_at(&self, now: DateTime<Utc>) -> Turn {
        if self.include_timestamp {
            Turn::system(
                format!(
                    "{}\nThe current date and time is {}.",
                    self.system_prompt.trim_end(),
                    now.format("%A, %d %B %Y %H:%M UTC")
                )
            )
        } else {
            Turn::system(self.system_prompt.clone())
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self::new("You are a helpful, emotionally aware assistant.", true)
    }
}
