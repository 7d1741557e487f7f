//! CLI for MagicLens - restyle a photo with a preset.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use magiclens::presets::{self, PresetCategory};
use magiclens::{CredentialHolder, FlowStep, GeminiModel, GeminiTransformer, RawFile, Session};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "magiclens")]
#[command(about = "Apply preset AI styles to photos via the Gemini image API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available style presets
    Presets(PresetsArgs),

    /// Transform a photo with a preset and save the result
    Transform(TransformArgs),

    /// Check which API key would be used
    CheckKey(KeyArgs),
}

#[derive(Args)]
struct PresetsArgs {
    /// Only show one category
    #[arg(long, value_enum)]
    category: Option<CategoryArg>,
}

#[derive(Args)]
struct KeyArgs {
    /// API key to use instead of the environment default
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args)]
struct TransformArgs {
    /// Preset id (see `magiclens presets`)
    #[arg(short, long)]
    preset: u32,

    /// Photo to transform
    #[arg(short, long)]
    input: PathBuf,

    /// Directory the result is written to
    #[arg(short, long, env = "MAGICLENS_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Model to use
    #[arg(short, long, value_enum, env = "MAGICLENS_MODEL", default_value = "flash")]
    model: ModelArg,

    /// Give up on the request after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(flatten)]
    key: KeyArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    Flash,
    Pro,
    FlashPreview,
}

impl From<ModelArg> for GeminiModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Flash => GeminiModel::FlashImage,
            ModelArg::Pro => GeminiModel::ProImage,
            ModelArg::FlashPreview => GeminiModel::FlashImagePreview,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Style,
    Professional,
    Fun,
    Age,
}

impl From<CategoryArg> for PresetCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Style => PresetCategory::Style,
            CategoryArg::Professional => PresetCategory::Professional,
            CategoryArg::Fun => PresetCategory::Fun,
            CategoryArg::Age => PresetCategory::Age,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("magiclens=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Presets(args) => list_presets(args, cli.json)?,
        Commands::Transform(args) => transform(args, cli.json).await?,
        Commands::CheckKey(args) => check_key(args, cli.json).await?,
    }

    Ok(())
}

/// Gets the session past the credential gate: an explicit key wins over the
/// environment default.
async fn unlock(session: &mut Session<GeminiTransformer>, api_key: Option<&str>) -> anyhow::Result<()> {
    match api_key {
        Some(key) => {
            session.submit_credential(Some(key)).await?;
        }
        None => {
            if !session.check_credential().await {
                session.submit_credential(None).await?;
            }
        }
    }
    Ok(())
}

fn list_presets(args: PresetsArgs, json_output: bool) -> anyhow::Result<()> {
    let selected: Vec<_> = match args.category {
        Some(category) => presets::by_category(category.into()).collect(),
        None => presets::list().iter().collect(),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&selected)?);
    } else {
        println!("Available presets:\n");
        for p in selected {
            println!("  {:>2}  {} [{}]", p.id, p.label, p.category);
        }
    }
    Ok(())
}

async fn check_key(args: KeyArgs, json_output: bool) -> anyhow::Result<()> {
    let provider = GeminiTransformer::builder().build()?;
    let mut session = Session::new(provider, CredentialHolder::from_env());
    unlock(&mut session, args.api_key.as_deref()).await?;

    let origin = session
        .credential_origin()
        .context("no credential after unlocking")?;
    if json_output {
        let result = serde_json::json!({ "origin": origin });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("API key available ({origin})");
    }
    Ok(())
}

async fn transform(args: TransformArgs, json_output: bool) -> anyhow::Result<()> {
    let mut builder = GeminiTransformer::builder().model(args.model.into());
    if let Some(secs) = args.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let provider = builder.build()?;

    let mut session = Session::new(provider, CredentialHolder::from_env());
    unlock(&mut session, args.key.api_key.as_deref()).await?;

    let preset = session.select_preset(args.preset)?;
    let file = RawFile::from_path(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input.display()))?;
    session.accept_upload(file).await?;

    let pending = session
        .start_generation()
        .context("generation could not be started")?;

    // Ctrl-C cancels the request instead of killing the process mid-write.
    let token = pending.cancellation_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    let outcome = pending.run().await;
    watcher.abort();

    match session.finish_generation(outcome) {
        FlowStep::ViewingResult => {}
        FlowStep::AwaitingCredential => {
            anyhow::bail!(
                "{} (pass a valid key with --api-key)",
                session.last_error().unwrap_or("API key rejected")
            );
        }
        _ => {
            anyhow::bail!(
                "{}",
                session.last_error().unwrap_or("generation failed, please retry")
            );
        }
    }

    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    let path = session.download(&args.output_dir).await?;
    let metadata = session
        .result()
        .map(|r| r.metadata.clone())
        .unwrap_or_default();

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "output": path.display().to_string(),
            "preset": preset.id,
            "model": metadata.model,
            "duration_ms": metadata.duration_ms,
            "session": session.snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Transformed with \"{}\": {}", preset.label, path.display());
        if let Some(duration) = metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
    }

    Ok(())
}
