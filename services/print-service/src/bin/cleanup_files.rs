// File retention command for cron or manual runs
use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use print_service::config::{init_db_pool, StorageConfig};
use print_service::domain::retention::{
    cleanup_potential, run_cleanup, CleanupOptions, CleanupReport, FileOutcome, RetentionCategory,
    RetentionPolicy, MAX_RETENTION_DAYS,
};
use print_service::repositories::order_repo::OrderRepository;
use print_service::utils::storage::FileStorage;

#[derive(Parser)]
#[command(name = "cleanup-files")]
#[command(about = "Delete print files past their retention window")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Order files by status category, plus stale temp uploads
    Orders {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Only this category
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// Custom retention window in days for order files
        #[arg(long, value_parser = clap::value_parser!(u32).range(..=MAX_RETENTION_DAYS))]
        days: Option<u32>,
        /// Leave temp uploads alone
        #[arg(long, default_value_t = false)]
        no_temp: bool,
    },
    /// Temp uploads only
    Temp {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Storage usage and cleanup potential
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Delivered,
    Cancelled,
    Failed,
}

impl From<StatusArg> for RetentionCategory {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Delivered => RetentionCategory::Delivered,
            StatusArg::Cancelled => RetentionCategory::Cancelled,
            StatusArg::Failed => RetentionCategory::Failed,
        }
    }
}

impl Command {
    fn cleanup_options(&self) -> Option<CleanupOptions> {
        match self {
            Command::Orders { dry_run, status, days, no_temp } => Some(CleanupOptions {
                dry_run: *dry_run,
                category: status.map(RetentionCategory::from),
                days_override: days.map(i64::from),
                include_temp: !no_temp,
                include_orders: true,
            }),
            Command::Temp { dry_run } => Some(CleanupOptions {
                dry_run: *dry_run,
                include_orders: false,
                ..CleanupOptions::default()
            }),
            Command::Stats => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "print_service=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = StorageConfig::from_env().map_err(|e| anyhow!(e))?;
    let pool = init_db_pool(&config.database_url)
        .await
        .context("Failed to connect to the database")?;
    let orders = OrderRepository::new(pool);
    let storage = FileStorage::new(&config.media_root);
    let policy = RetentionPolicy::default();

    match cli.command.cleanup_options() {
        Some(options) => {
            let report = run_cleanup(&orders, &storage, &policy, &options, Utc::now()).await?;
            print_report(&report);
            if report.failures > 0 {
                return Err(anyhow!("{} file(s) could not be deleted", report.failures));
            }
        }
        None => {
            let stats = storage.stats();
            let potential = cleanup_potential(&orders, &storage, &policy, Utc::now()).await?;
            let counts = orders.status_file_counts().await?;

            println!("📁 Storage under {}", storage.root().display());
            println!("  Order files: {} ({:.2} MB)", stats.order_files, stats.order_mb());
            println!("    PDF: {}  Images: {}", stats.order_pdf_files, stats.order_image_files);
            println!("  Temp files:  {} ({:.2} MB)", stats.temp_files, stats.temp_mb());
            println!("  Total:       {} ({:.2} MB)", stats.total_files, stats.total_mb());
            println!();
            println!("📦 Orders by status");
            for count in &counts {
                println!("  {:<16} {:>6} orders, {:>6} with files", count.status, count.orders, count.with_files);
            }
            println!();
            println!(
                "🧹 Cleanup would free {:.2} MB from {} order(s)",
                potential.estimated_mb, potential.eligible_orders
            );
        }
    }

    Ok(())
}

fn print_report(report: &CleanupReport) {
    let prefix = if report.dry_run { "[DRY RUN] " } else { "" };

    for detail in &report.details {
        let label = match detail.outcome {
            FileOutcome::Deleted => "deleted",
            FileOutcome::WouldDelete => "would delete",
            FileOutcome::Missing => "missing",
            FileOutcome::Skipped => "skipped",
            FileOutcome::Failed => "FAILED",
        };
        println!(
            "  {:<12} {:<9} {} ({} days, {} bytes){}",
            label,
            detail.category,
            detail.file_path,
            detail.age_days,
            detail.size_bytes,
            detail.error.as_deref().map(|e| format!(" {}", e)).unwrap_or_default()
        );
    }

    println!();
    println!("{}Cleanup summary", prefix);
    println!("  Eligible orders:    {}", report.eligible_orders);
    println!("  Orders processed:   {}", report.orders_processed);
    println!("  Order files:        {}", report.files_deleted);
    println!("  Temp files:         {}", report.temp_files_deleted);
    println!("  Missing:            {}", report.missing);
    println!("  Failures:           {}", report.failures);
    println!("  Space freed:        {:.2} MB", report.mb_freed);
}
