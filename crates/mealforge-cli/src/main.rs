mod config;
mod enqueue_cmd;
mod generate_cmd;
mod log_cmd;
mod serve;
mod status_cmd;
mod worker_cmd;

#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};

use mealforge_core::queue::{PgJobQueue, RetryPolicy};
use mealforge_db::config::DbConfig;
use mealforge_db::pool;
use mealforge_db::queries::jobs as job_db;

use config::ResolvedConfig;
use generate_cmd::OutputFormat;

#[derive(Parser)]
#[command(name = "mealforge", about = "Background meal-plan generation pipeline")]
struct Cli {
    /// Database URL (overrides MEALFORGE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a mealforge config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// Base URL of the plan persistence service
        #[arg(long)]
        persistence_url: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create and migrate the job database
    DbInit,
    /// Queue an intake form (JSON) for plan generation
    Enqueue {
        /// Path to the intake JSON file
        file: PathBuf,
        /// Attempts before the job is dead-lettered
        #[arg(long, default_value_t = RetryPolicy::default().max_attempts)]
        max_attempts: u32,
        /// Delay before the job becomes claimable, in seconds
        #[arg(long, default_value_t = 0)]
        delay: u64,
    },
    /// Run the worker pool and the job status server
    Worker {
        /// Address for the status server
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port for the status server
        #[arg(long, default_value_t = 8787)]
        port: u16,
        /// Lock owner prefix (defaults to worker-<pid>)
        #[arg(long)]
        worker_id: Option<String>,
    },
    /// Generate a plan in-process from an intake file, without the queue
    Generate {
        /// Path to the intake JSON file
        file: PathBuf,
        /// What to print
        #[arg(long, value_enum, default_value_t = OutputFormat::Scorecard)]
        format: OutputFormat,
        /// Print stage progress to stderr
        #[arg(long, short)]
        verbose: bool,
    },
    /// Show queue status (omit job_id for a queue overview)
    Status {
        /// Job ID to show status for
        job_id: Option<String>,
    },
    /// Show the recorded progress events of a job
    Log {
        /// Job ID to show events for
        job_id: String,
        /// Filter to a specific attempt number
        #[arg(long)]
        attempt: Option<i32>,
    },
    /// List dead-lettered jobs
    Dlq,
    /// Print shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

/// Execute the `mealforge init` command: write config file.
fn cmd_init(db_url: &str, persistence_url: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let secret = config::generate_secret();
    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        persistence: config::PersistenceSection {
            url: persistence_url.clone(),
            secret: secret.clone(),
        },
        recipes: config::ServiceSection::default(),
        nutrition: config::ServiceSection::default(),
    };

    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    if let Some(url) = &persistence_url {
        println!("  persistence.url = {url}");
    }
    println!("  persistence.secret = {}...{}", &secret[..8], &secret[56..]);
    println!();
    println!("Share the secret with the persistence service, then run `mealforge db-init`.");

    Ok(())
}

/// Execute the `mealforge db-init` command: create database and run migrations.
async fn cmd_db_init(resolved: &ResolvedConfig) -> anyhow::Result<()> {
    println!("Initializing mealforge database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let result = async {
        pool::run_migrations(&db_pool).await?;
        job_db::count_by_status(&db_pool, mealforge_core::queue::PLAN_GENERATION_QUEUE).await
    }
    .await;
    db_pool.close().await;

    let counts = result?;
    println!("Database ready ({} jobs queued).", counts.total());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            persistence_url,
            force,
        } => {
            cmd_init(&db_url, persistence_url, force)?;
        }
        Commands::Generate {
            file,
            format,
            verbose,
        } => {
            generate_cmd::run_generate(&file, format, verbose).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "mealforge", &mut std::io::stdout());
        }
        Commands::DbInit => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref())?;
            cmd_db_init(&resolved).await?;
        }
        Commands::Enqueue {
            file,
            max_attempts,
            delay,
        } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let queue = PgJobQueue::new(db_pool.clone());
            let result = enqueue_cmd::run_enqueue(&queue, &file, max_attempts, delay).await;
            db_pool.close().await;
            result?;
        }
        Commands::Worker {
            bind,
            port,
            worker_id,
        } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref())?;
            resolved.validate()?;
            let db_config = resolved
                .db_config
                .clone()
                .for_workers(resolved.app.worker.concurrency);
            let db_pool = pool::create_pool(&db_config).await?;
            let options = worker_cmd::WorkerOptions {
                bind,
                port,
                worker_id,
            };
            let result = worker_cmd::run_worker(&resolved.app, db_pool.clone(), options).await;
            db_pool.close().await;
            result?;
        }
        Commands::Status { job_id } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = status_cmd::run_status(&db_pool, job_id.as_deref()).await;
            db_pool.close().await;
            result?;
        }
        Commands::Log { job_id, attempt } => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = log_cmd::run_log(&db_pool, &job_id, attempt).await;
            db_pool.close().await;
            result?;
        }
        Commands::Dlq => {
            let resolved = ResolvedConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = status_cmd::run_dlq(&db_pool).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
