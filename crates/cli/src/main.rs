mod config;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use cadenza_core::format::{format_duration, truncate_text};
use cadenza_core::{cost, ModelTier};
use cadenza_engine::synth::{
    ArtifactRef, HttpSynthesizer, SimulatedSynthesizer, SynthesisError, SynthesisJob, Synthesizer,
};
use cadenza_engine::{GenerationEngine, GenerationOutcome, GenerationParams};
use cadenza_storage::{AccountRecord, MemoryStore, PackageRecord, RecordStore};

use config::StudioConfig;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Cadenza music generation studio.
#[derive(Parser)]
#[command(name = "cadenza", version, about = "Cadenza music generation studio")]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true, default_value = "cadenza.toml")]
    config: PathBuf,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one track and wait for the result
    Generate {
        /// What to generate
        #[arg(short, long)]
        prompt: String,
        /// Model tier (tier1, tier2, tier3); defaults to the account's model
        #[arg(short, long)]
        model: Option<ModelTier>,
        /// Track length in seconds
        #[arg(short, long, default_value_t = 60)]
        duration: u32,
        /// Skip the simulated pipeline delays
        #[arg(long)]
        instant: bool,
        /// Force the synthesis to fail (exercises the refund path)
        #[arg(long)]
        simulate_failure: bool,
    },

    /// Run a scripted session: generate each prompt, then show the
    /// session shelf, history, stats, and the transaction log
    Session {
        /// Prompts to generate, in order
        #[arg(required = true)]
        prompts: Vec<String>,
        /// Skip the simulated pipeline delays
        #[arg(long)]
        instant: bool,
    },

    /// Show the account balance
    Balance,

    /// List purchasable token packages
    Packages,

    /// Buy a token package by id
    Buy {
        /// Package id (see `cadenza packages`)
        package_id: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(message) = run(cli).await {
        eprintln!("error: {message}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = StudioConfig::load(&cli.config).map_err(|e| e.to_string())?;

    match cli.command {
        Commands::Generate {
            prompt,
            model,
            duration,
            instant,
            simulate_failure,
        } => {
            let engine = setup(&config, instant, simulate_failure).await?;
            let model = model.unwrap_or(config.account.default_model);
            cmd_generate(
                &engine,
                &config.account.user_id,
                prompt,
                model,
                duration,
                cli.output,
            )
            .await
        }
        Commands::Session { prompts, instant } => {
            let engine = setup(&config, instant, false).await?;
            cmd_session(&engine, &config.account.user_id, prompts, cli.output).await
        }
        Commands::Balance => {
            let engine = setup(&config, true, false).await?;
            cmd_balance(&engine, &config.account.user_id, cli.output).await
        }
        Commands::Packages => {
            let engine = setup(&config, true, false).await?;
            cmd_packages(&engine, cli.output).await
        }
        Commands::Buy { package_id } => {
            let engine = setup(&config, true, false).await?;
            cmd_buy(&engine, &config.account.user_id, &package_id, cli.output).await
        }
    }
}

// ──────────────────────────────────────────────
// Session setup
// ──────────────────────────────────────────────

/// Synthesis backend selected by config.
enum AnySynthesizer {
    Simulated(SimulatedSynthesizer),
    Http(HttpSynthesizer),
}

#[async_trait]
impl Synthesizer for AnySynthesizer {
    async fn synthesize(&self, job: &SynthesisJob) -> Result<ArtifactRef, SynthesisError> {
        match self {
            AnySynthesizer::Simulated(s) => s.synthesize(job).await,
            AnySynthesizer::Http(s) => s.synthesize(job).await,
        }
    }

    fn backend_id(&self) -> &str {
        match self {
            AnySynthesizer::Simulated(s) => s.backend_id(),
            AnySynthesizer::Http(s) => s.backend_id(),
        }
    }
}

const DEFAULT_PACKAGES: [(&str, &str, i64, i64, i32); 3] = [
    // (id, name, tokens, price cents, display order)
    ("starter", "Starter", 100, 499, 1),
    ("creator", "Creator", 500, 1999, 2),
    ("studio", "Studio", 1500, 4999, 3),
];

/// Build the session: seed the store from config, select the synthesis
/// backend, and wire the engine.
async fn setup(
    config: &StudioConfig,
    instant: bool,
    simulate_failure: bool,
) -> Result<GenerationEngine<MemoryStore, AnySynthesizer>, String> {
    let store = Arc::new(MemoryStore::new());

    let now = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());
    store
        .create_account(AccountRecord {
            user_id: config.account.user_id.clone(),
            email: config.account.email.clone(),
            display_name: None,
            token_balance: 0,
            total_purchased: 0,
            total_used: 0,
            default_model: config.account.default_model,
            auto_download: false,
            email_notifications: true,
            created_at: now.clone(),
            updated_at: now.clone(),
        })
        .await
        .map_err(|e| e.to_string())?;

    for (id, name, tokens, cents, order) in DEFAULT_PACKAGES {
        store.insert_package(PackageRecord {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            token_amount: tokens,
            price_usd: Decimal::new(cents, 2),
            is_active: true,
            display_order: order,
            created_at: now.clone(),
        });
    }

    let synth = match config.synthesizer.backend.as_str() {
        "simulated" => {
            let mut simulated = if instant {
                SimulatedSynthesizer::instant()
            } else {
                SimulatedSynthesizer::new()
            };
            if simulate_failure {
                simulated = simulated.failing_with("synthesis engine unavailable");
            }
            AnySynthesizer::Simulated(simulated)
        }
        "http" => {
            let base_url = config
                .synthesizer
                .base_url
                .as_deref()
                .ok_or("synthesizer.base_url is required for the http backend")?;
            AnySynthesizer::Http(HttpSynthesizer::new(
                base_url,
                config.synthesizer.auth_token.clone(),
            ))
        }
        other => return Err(format!("unknown synthesizer backend '{other}'")),
    };

    let engine = GenerationEngine::new(store, Arc::new(synth))
        .with_synthesis_timeout(Duration::from_secs(config.synthesizer.timeout_seconds));

    // The starting grant goes through the ledger so the transaction log
    // reconciles with the balance from token zero.
    if config.account.starting_tokens > 0 {
        engine
            .ledger()
            .credit(
                &config.account.user_id,
                config.account.starting_tokens,
                cadenza_core::TransactionKind::Purchase,
                None,
            )
            .await
            .map_err(|e| e.to_string())?;
    }

    Ok(engine)
}

// ──────────────────────────────────────────────
// Commands
// ──────────────────────────────────────────────

async fn cmd_generate(
    engine: &GenerationEngine<MemoryStore, AnySynthesizer>,
    user_id: &str,
    prompt: String,
    model: ModelTier,
    duration: u32,
    output: OutputFormat,
) -> Result<(), String> {
    let tokens = cost(model, duration);
    if output == OutputFormat::Text {
        println!(
            "Generating \"{}\" on {} for {} ({} tokens)",
            truncate_text(&prompt, 50),
            model.display_name(),
            format_duration(duration),
            tokens
        );
    }

    let handle = engine
        .submit(
            user_id,
            GenerationParams {
                prompt,
                model,
                duration_seconds: duration,
            },
        )
        .await
        .map_err(|e| e.to_string())?;
    let outcome = handle.outcome().await.map_err(|e| e.to_string())?;

    let account = engine.ledger().account(user_id).await.map_err(|e| e.to_string())?;
    match outcome {
        GenerationOutcome::Completed { request, track } => {
            match output {
                OutputFormat::Text => {
                    println!("Completed: {} -> {}", track.title, track.audio_url);
                    println!("Balance: {} tokens", account.token_balance);
                }
                OutputFormat::Json => {
                    let value = serde_json::json!({
                        "status": "completed",
                        "generation": request,
                        "track": track,
                        "balance": account.token_balance,
                    });
                    println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
                }
            }
            Ok(())
        }
        GenerationOutcome::Failed { request, failure } => {
            if output == OutputFormat::Json {
                let value = serde_json::json!({
                    "status": "failed",
                    "generation": request,
                    "balance": account.token_balance,
                });
                println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            }
            Err(format!(
                "{failure} ({} tokens refunded, balance {})",
                request.tokens_reserved, account.token_balance
            ))
        }
    }
}

async fn cmd_session(
    engine: &GenerationEngine<MemoryStore, AnySynthesizer>,
    user_id: &str,
    prompts: Vec<String>,
    output: OutputFormat,
) -> Result<(), String> {
    let account = engine.ledger().account(user_id).await.map_err(|e| e.to_string())?;
    let model = account.default_model;

    for prompt in prompts {
        let duration = 60;
        match engine
            .submit(
                user_id,
                GenerationParams {
                    prompt: prompt.clone(),
                    model,
                    duration_seconds: duration,
                },
            )
            .await
        {
            Ok(handle) => match handle.outcome().await.map_err(|e| e.to_string())? {
                GenerationOutcome::Completed { track, .. } => {
                    println!("Completed: {} ({})", track.title, truncate_text(&prompt, 40));
                }
                GenerationOutcome::Failed { failure, .. } => {
                    println!("Failed: {} ({failure}; tokens refunded)", truncate_text(&prompt, 40));
                }
            },
            Err(e) => println!("Rejected: {} ({e})", truncate_text(&prompt, 40)),
        }
    }

    if output == OutputFormat::Json {
        let history = engine.history(user_id, 0).await.map_err(|e| e.to_string())?;
        let transactions = engine.transactions(user_id, 0).await.map_err(|e| e.to_string())?;
        let value = serde_json::json!({
            "history": history,
            "transactions": transactions,
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return Ok(());
    }

    println!();
    println!("Session tracks (audio lives in memory only; gone on exit):");
    {
        let tracks = engine.session_tracks();
        let tracks = tracks.lock().unwrap_or_else(|e| e.into_inner());
        if tracks.is_empty() {
            println!("  (none)");
        }
        for track in tracks.tracks() {
            let marker = if tracks.active().map(|t| t.generation_id.as_str())
                == Some(track.generation_id.as_str())
            {
                "*"
            } else {
                " "
            };
            println!("  {marker} {} -> {}", track.title, track.audio_url);
        }
    }

    println!();
    println!("History:");
    for gen in engine.history(user_id, 10).await.map_err(|e| e.to_string())? {
        println!(
            "  {} [{}] {} {} {}",
            gen.id,
            gen.status,
            gen.model,
            format_duration(gen.duration_seconds),
            truncate_text(&gen.prompt, 40)
        );
    }

    let month_start = {
        let now = time::OffsetDateTime::now_utc();
        now.replace_day(1)
            .map(|d| d.replace_time(time::Time::MIDNIGHT))
            .unwrap_or(now)
    };
    let stats = engine
        .stats_since(user_id, Some(month_start))
        .await
        .map_err(|e| e.to_string())?;
    println!();
    println!("This month:");
    println!("  generations: {}", stats.generation_count);
    println!("  tokens used: {}", stats.tokens_used);
    if let Some(avg) = stats.average_completion_seconds {
        println!("  avg generation time: {avg}s");
    }
    if let Some(favorite) = stats.favorite_model {
        println!("  favorite model: {}", favorite.display_name());
    }

    println!();
    println!("Transactions:");
    for tx in engine.transactions(user_id, 20).await.map_err(|e| e.to_string())? {
        let amount = if tx.token_amount > 0 {
            format!("+{}", tx.token_amount)
        } else {
            tx.token_amount.to_string()
        };
        println!("  {} {} {}", tx.created_at, tx.kind, amount);
    }

    let account = engine.ledger().account(user_id).await.map_err(|e| e.to_string())?;
    println!();
    println!("Balance: {} tokens", account.token_balance);
    Ok(())
}

async fn cmd_balance(
    engine: &GenerationEngine<MemoryStore, AnySynthesizer>,
    user_id: &str,
    output: OutputFormat,
) -> Result<(), String> {
    let account = engine.ledger().account(user_id).await.map_err(|e| e.to_string())?;
    match output {
        OutputFormat::Text => {
            println!("Balance: {} tokens", account.token_balance);
            println!("Total purchased: {}", account.total_purchased);
            println!("Total used: {}", account.total_used);
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&account).unwrap_or_default()
            );
        }
    }
    Ok(())
}

async fn cmd_packages(
    engine: &GenerationEngine<MemoryStore, AnySynthesizer>,
    output: OutputFormat,
) -> Result<(), String> {
    let packages = engine.packages().await.map_err(|e| e.to_string())?;
    match output {
        OutputFormat::Text => {
            for pkg in packages {
                println!(
                    "{:<10} {:>5} tokens  ${}  ({})",
                    pkg.id, pkg.token_amount, pkg.price_usd, pkg.name
                );
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&packages).unwrap_or_default()
            );
        }
    }
    Ok(())
}

async fn cmd_buy(
    engine: &GenerationEngine<MemoryStore, AnySynthesizer>,
    user_id: &str,
    package_id: &str,
    output: OutputFormat,
) -> Result<(), String> {
    let account = engine
        .purchase(user_id, package_id)
        .await
        .map_err(|e| e.to_string())?;
    match output {
        OutputFormat::Text => {
            println!("Purchased '{package_id}'. Balance: {} tokens", account.token_balance);
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&account).unwrap_or_default()
            );
        }
    }
    Ok(())
}
