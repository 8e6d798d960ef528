mod config;
mod prompts;
mod trace;
mod translator;

use std::fmt;

pub use config::{init_default_config, ConfigOverrides, PipelineConfig};
pub use prompts::{default_prompt_files, render_template, PromptId, PromptSet};
pub use trace::{TraceKind, TraceWriter};
pub use translator::{
    reassemble, AgentSettings, Mode, Translation, TranslationAgent, TranslationPlan,
    TranslationRequest, UnitState, DEFAULT_TOKEN_BUDGET,
};

/// The three calls made for every unit, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Initial,
    Reflect,
    Improve,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Initial, Stage::Reflect, Stage::Improve];

    pub fn name(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Reflect => "reflect",
            Self::Improve => "improve",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
