use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use translation_agent::pipeline::{
    init_default_config, ConfigOverrides, Mode, PipelineConfig, TranslationRequest,
};
use translation_agent::progress::ConsoleProgress;
use translation_agent::SplitDecision;

#[derive(Parser, Debug)]
#[command(name = "translation-agent")]
#[command(about = "LLM translation with reflection: translate, critique, improve", long_about = None)]
struct Args {
    /// Generate default config + prompt files in DIR (default: current directory), then exit
    #[arg(long, value_name = "DIR", num_args = 0..=1, default_missing_value = ".")]
    init_config: Option<PathBuf>,

    /// Overwrite existing config/prompt files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Source language name (e.g. English)
    #[arg(long)]
    source_lang: Option<String>,

    /// Target language name (e.g. Spanish)
    #[arg(long)]
    target_lang: Option<String>,

    /// Country whose regional dialect the translation should follow
    #[arg(long)]
    country: Option<String>,

    /// Input text file (default: stdin)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output text file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Config file path (default: search for translation-agent.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Token budget per request; longer input is split into chunks
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Chat model name
    #[arg(long)]
    model: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Tokenizer encoding (o200k_base, cl100k_base, ...); default derives from --model
    #[arg(long)]
    encoding: Option<String>,

    /// Chunks translated in parallel within one stage
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print the chunk plan as JSON and exit (no model calls)
    #[arg(long)]
    plan: bool,

    /// No progress lines on stderr
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("translation_agent=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let args = Args::parse();

    if let Some(dir) = args.init_config.as_ref() {
        let cfg_path = init_default_config(dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let cfg = PipelineConfig::from_overrides(ConfigOverrides {
        config_path: args.config.clone(),
        model: args.model.clone(),
        base_url: args.base_url.clone(),
        api_key: None,
        encoding: args.encoding.clone(),
        max_tokens: args.max_tokens,
        concurrency: args.concurrency,
        temperature: None,
    })
    .context("build config")?;
    tracing::info!(config = %cfg.config_path.display(), model = %cfg.client.model, "config loaded");

    let langs = (args.source_lang.as_deref(), args.target_lang.as_deref());
    if !args.plan && (langs.0.is_none() || langs.1.is_none()) {
        anyhow::bail!("--source-lang and --target-lang are required");
    }

    let source_text = read_input(args.input.as_ref())?;
    let agent = cfg.build_agent(ConsoleProgress::new(!args.quiet))?;

    if args.plan {
        let plan = agent.plan(&source_text, cfg.token_budget)?;
        let chunk_size = match plan.decision {
            SplitDecision::NoSplitNeeded { .. } => None,
            SplitDecision::SplitRequired { chunk_size, .. } => Some(chunk_size),
        };
        let chunks: Vec<serde_json::Value> = plan
            .chunks
            .iter()
            .map(|c| {
                serde_json::json!({
                    "index": c.index,
                    "tokens": agent.counter().count_tokens(&c.text),
                    "chars": c.text.chars().count(),
                })
            })
            .collect();
        let report = serde_json::json!({
            "mode": match plan.mode() {
                Mode::Single => "single",
                Mode::Multi => "multi",
            },
            "num_tokens": plan.decision.num_tokens(),
            "token_budget": cfg.token_budget,
            "chunk_size": chunk_size,
            "chunks": chunks,
        });
        write_output(args.output.as_ref(), &serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    let (Some(source_lang), Some(target_lang)) = (langs.0, langs.1) else {
        anyhow::bail!("missing --source-lang/--target-lang");
    };
    let request = TranslationRequest::new(
        source_lang,
        target_lang,
        source_text,
        args.country.as_deref(),
        cfg.token_budget,
    );

    let translation = agent.run(&request)?;
    write_output(args.output.as_ref(), &translation.text)?;

    if !translation.is_complete() {
        for err in &translation.failures {
            eprintln!("error: {err}");
        }
        anyhow::bail!(
            "{} of {} unit(s) failed; output is partial",
            translation.failures.len(),
            translation.units.len()
        );
    }
    Ok(())
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("read input: {}", p.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&PathBuf>, text: &str) -> anyhow::Result<()> {
    match path {
        Some(p) => std::fs::write(p, text).with_context(|| format!("write output: {}", p.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes()).context("write stdout")?;
            if !text.ends_with('\n') {
                stdout.write_all(b"\n").context("write stdout")?;
            }
            stdout.flush().context("flush stdout")
        }
    }
}
