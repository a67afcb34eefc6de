use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use restyle_contracts::{ModeRegistry, OrchestrationResult};
use restyle_engine::{cancel_after, Asset, EngineConfig, GenerateInput, Orchestrator};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "restyle", version, about = "Restyle image CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload an image, run one transformation, and print the result JSON.
    Generate(GenerateArgs),
    /// List the registered transformation modes.
    Modes(ModesArgs),
    /// Print the provider account credits.
    Credits(CreditsArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    mode: Option<String>,
    #[arg(long)]
    style: Option<PathBuf>,
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long)]
    content_type: Option<String>,
    #[arg(long)]
    api_base: Option<String>,
    /// Whole-pipeline deadline in seconds.
    #[arg(long)]
    deadline: Option<f64>,
    #[arg(long)]
    poll_interval: Option<f64>,
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[derive(Debug, Parser)]
struct ModesArgs {
    #[arg(long)]
    api_base: Option<String>,
}

#[derive(Debug, Parser)]
struct CreditsArgs {
    #[arg(long)]
    api_base: Option<String>,
}

const EXIT_FAILURE_RESULT: i32 = 2;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("restyle error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args).await,
        Command::Modes(args) => run_modes(args),
        Command::Credits(args) => run_credits(args).await,
    }
}

async fn run_generate(args: GenerateArgs) -> Result<i32> {
    let config = resolve_config(args.api_base.as_deref())?;
    let config = match args.poll_interval {
        Some(seconds) => config.with_poll_interval(seconds),
        None => config,
    };
    let config = match args.max_attempts {
        Some(attempts) => config.with_max_attempts(attempts),
        None => config,
    };

    let file = read_asset(&args.file, args.content_type.as_deref())?;
    let style = args
        .style
        .as_deref()
        .map(|path| read_asset(path, None))
        .transpose()?;
    let input = GenerateInput {
        file,
        mode: args.mode,
        style,
        text_prompt: args.prompt,
    };

    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());
    if let Some(seconds) = args.deadline {
        if !seconds.is_finite() || seconds <= 0.0 {
            bail!("--deadline must be a positive number of seconds");
        }
        let _deadline = cancel_after(cancel.clone(), Duration::from_secs_f64(seconds));
    }

    let orchestrator = Orchestrator::from_config(&config);
    let result = orchestrator.generate(&input, &cancel).await;
    cancel.cancel();
    print_json(&serde_json::to_value(&result)?)?;
    Ok(exit_code(&result))
}

fn run_modes(args: ModesArgs) -> Result<i32> {
    let registry = ModeRegistry::new(args.api_base.as_deref());
    let rows = registry
        .list()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()?;
    print_json(&json!({
        "default": registry.default_mode().map(|mode| mode.id.clone()),
        "modes": rows,
    }))?;
    Ok(0)
}

async fn run_credits(args: CreditsArgs) -> Result<i32> {
    let config = resolve_config(args.api_base.as_deref())?;
    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());
    let orchestrator = Orchestrator::from_config(&config);
    match orchestrator.credits(&cancel).await {
        Ok(credits) => {
            print_json(&credits)?;
            Ok(0)
        }
        Err(err) => {
            print_json(&serde_json::to_value(OrchestrationResult::from(err))?)?;
            Ok(EXIT_FAILURE_RESULT)
        }
    }
}

fn resolve_config(api_base: Option<&str>) -> Result<EngineConfig> {
    let mut config = EngineConfig::from_env().context("provider configuration")?;
    if let Some(base) = api_base.map(str::trim).filter(|value| !value.is_empty()) {
        config.api_base = base.trim_end_matches('/').to_string();
    }
    Ok(config)
}

fn watch_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!("ctrl-c handler unavailable: {err}");
                    return;
                }
                info!("interrupted; cancelling");
                cancel.cancel();
            }
        }
    });
}

fn read_asset(path: &Path, content_type: Option<&str>) -> Result<Asset> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }
    let content_type = match content_type.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value.to_string(),
        None => infer_content_type(path)
            .with_context(|| {
                format!("cannot infer content type for {}; pass --content-type", path.display())
            })?
            .to_string(),
    };
    Ok(Asset::new(bytes, content_type))
}

fn infer_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn exit_code(result: &OrchestrationResult) -> i32 {
    if result.is_success() {
        0
    } else {
        EXIT_FAILURE_RESULT
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use restyle_contracts::{FailureKind, OrchestrationError};

    use super::*;

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(infer_content_type(Path::new("a/selfie.JPG")), Some("image/jpeg"));
        assert_eq!(infer_content_type(Path::new("x.jpeg")), Some("image/jpeg"));
        assert_eq!(infer_content_type(Path::new("x.png")), Some("image/png"));
        assert_eq!(infer_content_type(Path::new("x.webp")), Some("image/webp"));
        assert_eq!(infer_content_type(Path::new("x.gif")), Some("image/gif"));
        assert_eq!(infer_content_type(Path::new("x.bmp")), None);
        assert_eq!(infer_content_type(Path::new("noext")), None);
    }

    #[test]
    fn read_asset_uses_inferred_or_explicit_type() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("face.png");
        fs::write(&path, [0x89, b'P', b'N', b'G'])?;

        let asset = read_asset(&path, None)?;
        assert_eq!(asset.content_type, "image/png");
        assert_eq!(asset.bytes, vec![0x89, b'P', b'N', b'G']);

        let forced = read_asset(&path, Some("image/webp"))?;
        assert_eq!(forced.content_type, "image/webp");
        Ok(())
    }

    #[test]
    fn read_asset_rejects_empty_and_unknown_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let empty = dir.path().join("empty.png");
        fs::write(&empty, b"")?;
        assert!(read_asset(&empty, None).is_err());

        let unknown = dir.path().join("scan.tiff");
        fs::write(&unknown, [1, 2, 3])?;
        let err = read_asset(&unknown, None).unwrap_err();
        assert!(err.to_string().contains("--content-type"));

        assert!(read_asset(&dir.path().join("missing.png"), None).is_err());
        Ok(())
    }

    #[test]
    fn failure_results_exit_with_two() {
        let failure = OrchestrationResult::from(OrchestrationError::UnknownMode {
            mode: "sepia".to_string(),
        });
        assert_eq!(failure.failure_kind(), Some(FailureKind::UnknownMode));
        assert_eq!(exit_code(&failure), 2);

        let success = OrchestrationResult::Success {
            output_url: "https://cdn.test/out.jpg".to_string(),
            job_id: "ord-1".to_string(),
        };
        assert_eq!(exit_code(&success), 0);
    }

    #[test]
    fn generate_flags_parse() {
        let cli = Cli::parse_from([
            "restyle",
            "generate",
            "--file",
            "me.jpg",
            "--mode",
            "faceswap",
            "--style",
            "them.jpg",
            "--deadline",
            "90",
            "--max-attempts",
            "4",
        ]);
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.file, PathBuf::from("me.jpg"));
                assert_eq!(args.mode.as_deref(), Some("faceswap"));
                assert_eq!(args.style, Some(PathBuf::from("them.jpg")));
                assert_eq!(args.deadline, Some(90.0));
                assert_eq!(args.max_attempts, Some(4));
                assert_eq!(args.prompt, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
