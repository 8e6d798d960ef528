use tracing::{debug, info, warn};

use crate::error::TranslateError;
use crate::models::CompletionClient;
use crate::progress::ConsoleProgress;
use crate::splitter::{split_chunks, Chunk};
use crate::textutil::truncate_for_log;
use crate::tokenizer::{decide_split, SplitDecision, TokenCounter};

use super::prompts::{PromptId, PromptSet};
use super::trace::{TraceKind, TraceWriter};
use super::Stage;

mod pool;
mod stitch;

pub use stitch::reassemble;

pub const DEFAULT_TOKEN_BUDGET: usize = 1000;

#[derive(Clone, Debug)]
pub struct TranslationRequest {
    source_lang: String,
    target_lang: String,
    source_text: String,
    country: Option<String>,
    token_budget: usize,
}

impl TranslationRequest {
    pub fn new(
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        source_text: impl Into<String>,
        country: Option<&str>,
        token_budget: usize,
    ) -> Self {
        Self {
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            source_text: source_text.into(),
            country: country
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            token_budget,
        }
    }

    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// The whole text fits one request.
    Single,
    /// Chunks translated with the rest of the document as context.
    Multi,
}

#[derive(Clone, Debug)]
pub struct TranslationPlan {
    pub decision: SplitDecision,
    pub chunks: Vec<Chunk>,
}

impl TranslationPlan {
    pub fn mode(&self) -> Mode {
        match self.decision {
            SplitDecision::NoSplitNeeded { .. } => Mode::Single,
            SplitDecision::SplitRequired { .. } => Mode::Multi,
        }
    }
}

/// Artifacts of one unit. A field is filled once its stage succeeded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitState {
    pub initial: Option<String>,
    pub critique: Option<String>,
    pub final_translation: Option<String>,
}

impl UnitState {
    fn record(&mut self, stage: Stage, text: String) {
        match stage {
            Stage::Initial => self.initial = Some(text),
            Stage::Reflect => self.critique = Some(text),
            Stage::Improve => self.final_translation = Some(text),
        }
    }
}

#[derive(Debug)]
pub struct Translation {
    pub mode: Mode,
    /// Reassembled output; failed chunks contribute nothing.
    pub text: String,
    pub units: Vec<UnitState>,
    /// One `TranslateError::Unit` per failed chunk, in index order.
    pub failures: Vec<TranslateError>,
}

impl Translation {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The text, or the first chunk failure if any chunk is missing.
    pub fn into_text(mut self) -> Result<String, TranslateError> {
        if self.failures.is_empty() {
            Ok(self.text)
        } else {
            Err(self.failures.swap_remove(0))
        }
    }
}

#[derive(Clone, Debug)]
pub struct AgentSettings {
    pub token_budget: usize,
    /// Chunks of one stage run on up to this many threads.
    pub concurrency: usize,
    pub log_max_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            token_budget: DEFAULT_TOKEN_BUDGET,
            concurrency: 1,
            log_max_chars: 240,
        }
    }
}

/// Drives translate -> reflect -> improve for a whole text or its chunks.
pub struct TranslationAgent<C> {
    client: C,
    counter: Box<dyn TokenCounter>,
    prompts: PromptSet,
    settings: AgentSettings,
    progress: ConsoleProgress,
    trace: TraceWriter,
}

impl<C: CompletionClient> TranslationAgent<C> {
    pub fn new(client: C, counter: Box<dyn TokenCounter>, settings: AgentSettings) -> Self {
        Self {
            client,
            counter,
            prompts: PromptSet::default(),
            settings,
            progress: ConsoleProgress::silent(),
            trace: TraceWriter::disabled(),
        }
    }

    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ConsoleProgress) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace: TraceWriter) -> Self {
        self.trace = trace;
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn counter(&self) -> &dyn TokenCounter {
        self.counter.as_ref()
    }

    /// Entry point with the agent's configured token budget.
    pub fn translate(
        &self,
        source_lang: &str,
        target_lang: &str,
        source_text: &str,
        country: Option<&str>,
    ) -> Result<Translation, TranslateError> {
        let request = TranslationRequest::new(
            source_lang,
            target_lang,
            source_text,
            country,
            self.settings.token_budget,
        );
        self.run(&request)
    }

    pub fn plan(&self, text: &str, token_budget: usize) -> Result<TranslationPlan, TranslateError> {
        let decision = decide_split(self.counter.as_ref(), text, token_budget)?;
        let chunks = match decision {
            SplitDecision::NoSplitNeeded { .. } => vec![Chunk {
                index: 0,
                text: text.to_string(),
                preceding: String::new(),
                following: String::new(),
            }],
            SplitDecision::SplitRequired { chunk_size, .. } => {
                split_chunks(self.counter.as_ref(), text, chunk_size)
            }
        };
        Ok(TranslationPlan { decision, chunks })
    }

    pub fn run(&self, request: &TranslationRequest) -> Result<Translation, TranslateError> {
        let plan = self.plan(request.source_text(), request.token_budget())?;
        let mode = plan.mode();
        let n = plan.chunks.len();
        info!(
            ?mode,
            tokens = plan.decision.num_tokens(),
            budget = request.token_budget(),
            chunks = n,
            "translation plan"
        );
        self.progress.info(format!(
            "{} -> {}: {} token(s), {n} unit(s)",
            request.source_lang(),
            request.target_lang(),
            plan.decision.num_tokens()
        ));

        let mut states = vec![UnitState::default(); n];
        let mut failed: Vec<Option<TranslateError>> = (0..n).map(|_| None).collect();

        // Stage barrier: every unit finishes a stage before any unit starts the next.
        for stage in Stage::ALL {
            let pending: Vec<usize> = (0..n).filter(|&i| failed[i].is_none()).collect();
            if pending.is_empty() {
                break;
            }
            let stage_progress = self.progress.stage(stage.name(), pending.len());
            let results = pool::fan_out(&pending, self.settings.concurrency, |i| {
                let out = self.run_unit_stage(request, mode, stage, &plan.chunks[i], &states[i]);
                stage_progress.tick();
                out
            });
            for (i, result) in results {
                match result {
                    Ok(text) => states[i].record(stage, text),
                    Err(err) => {
                        warn!(unit = i, %stage, error = %err, "unit failed");
                        failed[i] = Some(err.in_unit(i, stage));
                    }
                }
            }
        }

        let mut failures: Vec<TranslateError> = failed.into_iter().flatten().collect();
        let text = match mode {
            Mode::Single => {
                if !failures.is_empty() {
                    return Err(failures.swap_remove(0));
                }
                states[0].final_translation.clone().unwrap_or_default()
            }
            Mode::Multi => {
                if !failures.is_empty() && failures.len() == n {
                    return Err(failures.swap_remove(0));
                }
                let finals: Vec<&str> = states
                    .iter()
                    .map(|s| s.final_translation.as_deref().unwrap_or(""))
                    .collect();
                reassemble(&finals)
            }
        };
        Ok(Translation {
            mode,
            text,
            units: states,
            failures,
        })
    }

    fn run_unit_stage(
        &self,
        request: &TranslationRequest,
        mode: Mode,
        stage: Stage,
        chunk: &Chunk,
        state: &UnitState,
    ) -> Result<String, TranslateError> {
        let (system_id, prompt_id) = prompt_ids(mode, stage, request.country().is_some());

        let tagged_text = match mode {
            Mode::Single => String::new(),
            Mode::Multi => chunk.tagged_text(),
        };
        let initial = state.initial.as_deref().unwrap_or("");
        let critique = state.critique.as_deref().unwrap_or("");
        let vars: [(&str, &str); 10] = [
            ("source_lang", request.source_lang()),
            ("target_lang", request.target_lang()),
            ("country", request.country().unwrap_or("")),
            ("source_text", &chunk.text),
            ("translation_1", initial),
            ("reflection", critique),
            ("tagged_text", &tagged_text),
            ("chunk_to_translate", &chunk.text),
            ("translation_1_chunk", initial),
            ("reflection_chunk", critique),
        ];

        let system_message = self.prompts.render(system_id, &vars)?;
        let prompt = self.prompts.render(prompt_id, &vars)?;
        if let Err(err) = self.trace.record(chunk.index, stage, TraceKind::Prompt, &prompt) {
            warn!(error = %err, "trace write failed");
        }

        let output = self.client.complete(&prompt, &system_message)?;
        debug!(
            unit = chunk.index,
            %stage,
            output = %truncate_for_log(&output, self.settings.log_max_chars),
            "completion"
        );
        if let Err(err) = self.trace.record(chunk.index, stage, TraceKind::Output, &output) {
            warn!(error = %err, "trace write failed");
        }
        Ok(output)
    }
}

fn prompt_ids(mode: Mode, stage: Stage, has_country: bool) -> (PromptId, PromptId) {
    match (mode, stage) {
        (Mode::Single, Stage::Initial) => (PromptId::SingleInitialSystem, PromptId::SingleInitial),
        (Mode::Single, Stage::Reflect) if has_country => {
            (PromptId::SingleReflectSystem, PromptId::SingleReflectCountry)
        }
        (Mode::Single, Stage::Reflect) => (PromptId::SingleReflectSystem, PromptId::SingleReflect),
        (Mode::Single, Stage::Improve) => (PromptId::SingleImproveSystem, PromptId::SingleImprove),
        (Mode::Multi, Stage::Initial) => (PromptId::MultiInitialSystem, PromptId::MultiInitial),
        (Mode::Multi, Stage::Reflect) if has_country => {
            (PromptId::MultiReflectSystem, PromptId::MultiReflectCountry)
        }
        (Mode::Multi, Stage::Reflect) => (PromptId::MultiReflectSystem, PromptId::MultiReflect),
        (Mode::Multi, Stage::Improve) => (PromptId::MultiImproveSystem, PromptId::MultiImprove),
    }
}
