//! mealgate: nutrition analysis CLI
//!
//! Runs a single analysis and prints the result as JSON.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mealgate::{Config, FallbackGenerator, ImageInput, Language, Secrets};

/// Mealgate CLI
#[derive(Parser)]
#[command(name = "mealgate")]
#[command(version = mealgate::PKG_VERSION)]
#[command(about = "Meal nutrition analysis")]
struct Args {
    /// Config file (default: ~/.mealgate/config.toml, then /etc/mealgate/config.toml)
    #[arg(short, long, env = "MEALGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a meal photo
    AnalyzeImage {
        /// JPEG, PNG, WebP or GIF file
        path: PathBuf,
        /// Result language (en, ko, ja, zh)
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Analyze a meal description
    AnalyzeText {
        /// Description (or omit to read from stdin)
        description: Option<String>,
        /// Result language (en, ko, ja, zh)
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Print a synthetic fallback analysis
    Fallback {
        /// Result language (en, ko, ja, zh)
        #[arg(short, long)]
        lang: Option<String>,
        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let language = |lang: Option<String>| {
        lang.map(|code| Language::from_code(&code))
            .unwrap_or_else(|| config.llm.language())
    };

    // Needs no credentials
    if let Command::Fallback { lang, seed } = args.command {
        let generator = match seed {
            Some(seed) => FallbackGenerator::seeded(seed),
            None => FallbackGenerator::new(),
        };
        let analysis = generator.generate(language(lang), None);
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    let api_key = Secrets::load()?.api_key().ok_or_else(|| {
        format!(
            "no API key: set {} or add [openai] api_key to ~/.mealgate/secrets.toml",
            mealgate::config::API_KEY_ENV
        )
    })?;
    let analyzer = config.analyzer(api_key)?;

    let analysis = match args.command {
        Command::AnalyzeImage { path, lang } => {
            let bytes = tokio::fs::read(&path).await?;
            let image = ImageInput::from_bytes(&bytes, mime_type(&path));
            analyzer.analyze_image(&image, language(lang)).await
        }
        Command::AnalyzeText { description, lang } => {
            let description = resolve_text(description, "analyze-text")?;
            analyzer.analyze_text(&description, language(lang)).await
        }
        Command::Fallback { .. } => unreachable!("handled above"),
    };
    analyzer.shutdown();

    if analysis.is_fallback() {
        tracing::warn!("analysis unavailable, showing an estimate");
    }
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
