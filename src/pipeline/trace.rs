use std::path::PathBuf;

use anyhow::Context;

use super::Stage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceKind {
    Prompt,
    Output,
}

impl TraceKind {
    fn name(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Output => "output",
        }
    }
}

/// Dumps rendered prompts and raw model output as
/// `unit_{index:04}.{stage}.{prompt|output}.txt`. Without a directory nothing is written.
#[derive(Debug, Default)]
pub struct TraceWriter {
    dir: Option<PathBuf>,
}

impl TraceWriter {
    pub fn new(dir: PathBuf, enabled: bool) -> anyhow::Result<Self> {
        if !enabled {
            return Ok(Self::disabled());
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create trace dir: {}", dir.display()))?;
        Ok(Self { dir: Some(dir) })
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn record(
        &self,
        index: usize,
        stage: Stage,
        kind: TraceKind,
        text: &str,
    ) -> anyhow::Result<()> {
        let Some(dir) = self.dir.as_ref() else {
            return Ok(());
        };
        let path = dir.join(format!("unit_{index:04}.{stage}.{}.txt", kind.name()));
        std::fs::write(&path, text).with_context(|| format!("write trace: {}", path.display()))
    }
}
