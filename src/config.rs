use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "translation-agent.toml";
pub const CONFIG_ENV: &str = "TRANSLATION_AGENT_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    /// Template overrides: prompt key -> file path.
    #[serde(default)]
    pub prompts: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Inline key. Prefer `api_key_env` for anything checked in.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the key (default: OPENAI_API_KEY).
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Token budget per request; longer input is split into chunks.
    #[serde(default)]
    pub max_tokens: Option<usize>,
    /// Tokenizer encoding, e.g. "cl100k_base". Derived from `model` when unset.
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub concurrency: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineSection {
    #[serde(default)]
    pub trace_dir: Option<String>,
    #[serde(default)]
    pub trace_prompts: Option<bool>,
    #[serde(default)]
    pub log_max_chars: Option<usize>,
}

pub fn find_file_upwards(start: &Path, filename: &str, max_depth: usize) -> Option<PathBuf> {
    let mut dir = Some(start);
    for _ in 0..=max_depth {
        let d = dir?;
        let cand = d.join(filename);
        if cand.is_file() {
            return Some(cand);
        }
        dir = d.parent();
    }
    None
}

pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections() {
        let cfg: AppConfig = toml::from_str(
            r#"
[agent]
model = "gpt-4o"
max_tokens = 800
encoding = "o200k_base"
concurrency = 3

[pipeline]
trace_prompts = false

[prompts]
single_initial = "prompts/single_initial.txt"
"#,
        )
        .unwrap();
        assert_eq!(cfg.agent.model.as_deref(), Some("gpt-4o"));
        assert_eq!(cfg.agent.max_tokens, Some(800));
        assert_eq!(cfg.agent.concurrency, Some(3));
        assert_eq!(cfg.pipeline.trace_prompts, Some(false));
        assert_eq!(cfg.prompts.len(), 1);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert!(cfg.agent.model.is_none());
        assert!(cfg.prompts.is_empty());
    }

    #[test]
    fn finds_config_in_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "").unwrap();
        let found = find_file_upwards(&nested, DEFAULT_CONFIG_FILE, 4).unwrap();
        assert_eq!(found, dir.path().join(DEFAULT_CONFIG_FILE));
        assert!(find_file_upwards(&nested, DEFAULT_CONFIG_FILE, 1).is_none());
    }
}
