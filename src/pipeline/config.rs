use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::config::{find_default_config, load_config, AppConfig, CONFIG_ENV, DEFAULT_CONFIG_FILE};
use crate::models::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::models::{OpenAiClient, OpenAiConfig};
use crate::pipeline::prompts::{default_prompt_files, PromptId, PromptSet, DEFAULT_PROMPTS_DIR};
use crate::pipeline::trace::TraceWriter;
use crate::pipeline::translator::{AgentSettings, TranslationAgent, DEFAULT_TOKEN_BUDGET};
use crate::progress::ConsoleProgress;
use crate::tokenizer::TiktokenCounter;

const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Values given on the command line (or through the C ABI); each one beats the file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub encoding: Option<String>,
    pub max_tokens: Option<usize>,
    pub concurrency: Option<usize>,
    pub temperature: Option<f32>,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub config_path: PathBuf,

    pub client: OpenAiConfig,
    pub encoding: Option<String>,
    pub token_budget: usize,
    pub concurrency: usize,

    pub trace_dir: PathBuf,
    pub trace_prompts: bool,
    pub log_max_chars: usize,

    pub prompts: PromptSet,
}

impl PipelineConfig {
    pub fn from_overrides(overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let cfg_file = overrides
            .config_path
            .clone()
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| find_default_config(DEFAULT_CONFIG_FILE));

        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
            } else if overrides.config_path.is_some() {
                anyhow::bail!("config file not found: {}", p.display());
            }
        }
        let cfg_path = cfg_file.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::from_file_config(&cfg_path, file_cfg, overrides)
    }

    /// Merges an already parsed file with the overrides. `cfg_path` anchors
    /// relative prompt and trace paths.
    pub fn from_file_config(
        cfg_path: &Path,
        file_cfg: AppConfig,
        overrides: ConfigOverrides,
    ) -> anyhow::Result<Self> {
        let cfg_dir = cfg_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let agent = file_cfg.agent;

        let api_key = overrides.api_key.or(agent.api_key).or_else(|| {
            let var = agent
                .api_key_env
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_API_KEY_ENV);
            std::env::var(var).ok()
        });
        let client = OpenAiConfig {
            base_url: non_empty(overrides.base_url.or(agent.base_url))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: non_empty(api_key),
            model: non_empty(overrides.model.or(agent.model))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: overrides.temperature.or(agent.temperature).unwrap_or(0.3),
            timeout: Duration::from_secs(agent.timeout_secs.unwrap_or(180).max(1)),
        };

        let token_budget = overrides
            .max_tokens
            .or(agent.max_tokens)
            .unwrap_or(DEFAULT_TOKEN_BUDGET);
        let concurrency = overrides.concurrency.or(agent.concurrency).unwrap_or(1).max(1);

        let trace_dir = file_cfg
            .pipeline
            .trace_dir
            .clone()
            .unwrap_or_else(|| "_trace".to_string());
        let trace_dir = if Path::new(&trace_dir).is_absolute() {
            PathBuf::from(trace_dir)
        } else {
            cfg_dir.join(trace_dir)
        };
        let trace_prompts = file_cfg.pipeline.trace_prompts.unwrap_or(false);
        let log_max_chars = file_cfg.pipeline.log_max_chars.unwrap_or(240);

        let prompts = PromptSet::load(&cfg_dir, &file_cfg.prompts).context("load prompts")?;

        Ok(Self {
            config_path: cfg_path.to_path_buf(),
            client,
            encoding: non_empty(overrides.encoding.or(agent.encoding)),
            token_budget,
            concurrency,
            trace_dir,
            trace_prompts,
            log_max_chars,
            prompts,
        })
    }

    pub fn settings(&self) -> AgentSettings {
        AgentSettings {
            token_budget: self.token_budget,
            concurrency: self.concurrency,
            log_max_chars: self.log_max_chars,
        }
    }

    pub fn build_agent(
        &self,
        progress: ConsoleProgress,
    ) -> anyhow::Result<TranslationAgent<OpenAiClient>> {
        let counter = TiktokenCounter::resolve(&self.client.model, self.encoding.as_deref())?;
        tracing::debug!(tokenizer = counter.identifier(), "tokenizer ready");
        let client = OpenAiClient::new(self.client.clone()).context("build http client")?;
        let trace = TraceWriter::new(self.trace_dir.clone(), self.trace_prompts)?;
        Ok(TranslationAgent::new(client, Box::new(counter), self.settings())
            .with_prompts(self.prompts.clone())
            .with_progress(progress)
            .with_trace(trace))
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Writes `translation-agent.toml` and every default prompt under `prompts/`.
/// Existing files are kept unless `force` is set.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(DEFAULT_CONFIG_FILE);

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;

    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, default_config_text())
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

fn default_config_text() -> String {
    let mut out = format!(
        r#"[agent]
base_url = "{DEFAULT_BASE_URL}"
model = "{DEFAULT_MODEL}"
api_key_env = "{DEFAULT_API_KEY_ENV}"
temperature = 0.3
# Token budget per request; longer texts are split into chunks.
max_tokens = {DEFAULT_TOKEN_BUDGET}
# encoding = "o200k_base"
timeout_secs = 180
concurrency = 1

[pipeline]
trace_dir = "_trace"
trace_prompts = false
log_max_chars = 240

[prompts]
"#
    );
    for id in PromptId::ALL {
        out.push_str(&format!(
            "{} = \"{DEFAULT_PROMPTS_DIR}/{}\"\n",
            id.key(),
            id.default_file_name()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_beat_file_values() {
        let file_cfg: AppConfig = toml::from_str(
            r#"
[agent]
model = "gpt-4o"
api_key = "from-file"
max_tokens = 500
concurrency = 2
"#,
        )
        .unwrap();
        let overrides = ConfigOverrides {
            model: Some("gpt-4o-mini".to_string()),
            max_tokens: Some(50),
            ..Default::default()
        };
        let cfg =
            PipelineConfig::from_file_config(Path::new("x/translation-agent.toml"), file_cfg, overrides)
                .unwrap();
        assert_eq!(cfg.client.model, "gpt-4o-mini");
        assert_eq!(cfg.client.api_key.as_deref(), Some("from-file"));
        assert_eq!(cfg.token_budget, 50);
        assert_eq!(cfg.concurrency, 2);
        assert_eq!(cfg.trace_dir, Path::new("x").join("_trace"));
    }

    #[test]
    fn defaults_without_file() {
        let cfg = PipelineConfig::from_file_config(
            Path::new(DEFAULT_CONFIG_FILE),
            AppConfig::default(),
            ConfigOverrides::default(),
        )
        .unwrap();
        assert_eq!(cfg.client.model, DEFAULT_MODEL);
        assert_eq!(cfg.client.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.token_budget, DEFAULT_TOKEN_BUDGET);
        assert_eq!(cfg.concurrency, 1);
        assert!(!cfg.trace_prompts);
        assert!(cfg.encoding.is_none());
    }

    #[test]
    fn init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = init_default_config(dir.path(), false).unwrap();
        for id in PromptId::ALL {
            assert!(dir
                .path()
                .join(DEFAULT_PROMPTS_DIR)
                .join(id.default_file_name())
                .is_file());
        }

        let file_cfg = load_config(&cfg_path).unwrap();
        assert_eq!(file_cfg.prompts.len(), PromptId::ALL.len());
        let cfg = PipelineConfig::from_file_config(&cfg_path, file_cfg, ConfigOverrides::default())
            .unwrap();
        assert_eq!(
            cfg.prompts.template(PromptId::MultiImprove),
            PromptId::MultiImprove.default_text()
        );
    }

    #[test]
    fn init_keeps_edited_files_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = init_default_config(dir.path(), false).unwrap();
        std::fs::write(&cfg_path, "[agent]\nmodel = \"custom\"\n").unwrap();

        init_default_config(dir.path(), false).unwrap();
        let kept = std::fs::read_to_string(&cfg_path).unwrap();
        assert!(kept.contains("custom"));

        init_default_config(dir.path(), true).unwrap();
        let replaced = std::fs::read_to_string(&cfg_path).unwrap();
        assert!(replaced.contains(DEFAULT_MODEL));
    }

    #[test]
    fn edited_prompt_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = init_default_config(dir.path(), false).unwrap();
        let p = dir
            .path()
            .join(DEFAULT_PROMPTS_DIR)
            .join(PromptId::SingleInitial.default_file_name());
        std::fs::write(&p, "Translate: {{source_text}}").unwrap();

        let cfg = PipelineConfig::from_overrides(ConfigOverrides {
            config_path: Some(cfg_path),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            cfg.prompts.template(PromptId::SingleInitial),
            "Translate: {{source_text}}"
        );
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::from_overrides(ConfigOverrides {
            config_path: Some(dir.path().join("nope.toml")),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
