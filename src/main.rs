use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use licensegate::config::Config;
use licensegate::db::{SqliteStore, create_pool};
use licensegate::hardware::{HardwareIdProvider, ProbeChain};
use licensegate::models::{IssueLicense, LicenseRecord, LicenseStatus, LicenseTier};
use licensegate::service::LicenseService;

#[derive(Parser)]
#[command(name = "licensegate")]
#[command(about = "Issue, activate, and manage single-device license keys")]
struct Cli {
    /// SQLite database path (overrides LICENSEGATE_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Issue a new, unbound license key
    Issue {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "standard")]
        tier: LicenseTier,
        /// lifetime, 3_day, 1_month, 1_year, N_days, or a day count
        #[arg(long)]
        duration: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Validate email + key for this machine, binding it on first use
    Activate {
        #[arg(long)]
        email: String,
        #[arg(long)]
        key: String,
    },
    /// Clear a license's hardware binding so another device can claim it
    ResetHwid {
        key: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Ban a license
    Ban {
        key: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Lift a ban
    Unban { key: String },
    /// Set a license to expire N days from now
    Extend {
        key: String,
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Show one license
    Show {
        key: String,
        #[arg(long)]
        json: bool,
    },
    /// List licenses
    List {
        #[arg(long)]
        status: Option<LicenseStatus>,
        #[arg(long)]
        json: bool,
    },
    /// Search licenses by email or key fragment
    Search {
        term: String,
        #[arg(long)]
        json: bool,
    },
    /// License counts by status
    Stats,
    /// Print this machine's hardware id
    Hwid,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("licensegate=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(path) = cli.database {
        config.database_path = path;
    }

    let hardware: Arc<dyn HardwareIdProvider> = Arc::new(ProbeChain::host_default());

    let pool = create_pool(&config.database_path, config.pool_size)
        .with_context(|| format!("opening database {}", config.database_path))?;
    tracing::debug!(path = %config.database_path, "database ready");

    let store = Arc::new(SqliteStore::new(pool));
    let service = LicenseService::with_store(store, &config, hardware);
    let admin = service.admin();

    match cli.command {
        Command::Issue {
            email,
            tier,
            duration,
            notes,
            json,
        } => {
            let input = IssueLicense {
                email,
                tier,
                duration: duration.unwrap_or_else(|| config.default_duration.clone()),
                notes,
            };
            let record = admin.issue(&input)?;
            if json {
                print_json(&record)?;
            } else {
                println!("License issued");
                print_record(&record);
            }
        }
        Command::Activate { email, key } => {
            let response = service.activate(&email, &key).await;
            println!("{}", response.message);
            if !response.granted {
                std::process::exit(1);
            }
        }
        Command::ResetHwid { key, yes } => {
            let record = admin.get(&key)?;
            if !yes && !confirm_reset(&record)? {
                println!("Reset cancelled.");
                return Ok(());
            }
            let response = service.admin_reset_hwid(&key).await;
            if !response.success {
                bail!("Failed to reset hardware binding for {}", key);
            }
            println!("Hardware binding cleared for {}", key);
        }
        Command::Ban { key, reason } => {
            admin.ban(&key, reason.as_deref())?;
            println!("License {} banned", key);
        }
        Command::Unban { key } => {
            admin.unban(&key)?;
            println!("License {} reactivated", key);
        }
        Command::Extend { key, days } => {
            let valid_until = admin.extend(&key, days)?;
            println!("License {} now valid until {}", key, valid_until);
        }
        Command::Show { key, json } => {
            let record = admin.get(&key)?;
            if json {
                print_json(&record)?;
            } else {
                print_record(&record);
            }
        }
        Command::List { status, json } => {
            let records = admin.list(status)?;
            print_records(&records, json)?;
        }
        Command::Search { term, json } => {
            let records = admin.search(&term)?;
            print_records(&records, json)?;
        }
        Command::Stats => {
            let stats = admin.stats()?;
            println!("Total:   {}", stats.total);
            println!("Active:  {}", stats.active);
            println!("Banned:  {}", stats.banned);
            println!("Expired: {}", stats.expired);
            println!("Bound:   {}", stats.bound);
        }
        Command::Hwid => {
            println!("{}", service.current_hardware_id());
        }
    }

    Ok(())
}

/// Ask the operator to confirm a reset on stdin. Anything but y/yes declines.
fn confirm_reset(record: &LicenseRecord) -> anyhow::Result<bool> {
    let bound = record.bound_hardware_id.as_deref().unwrap_or("(not bound)");
    print!(
        "Reset hardware binding for {} ({})?\nCurrently bound to: {}\nA different device will be able to claim this license. Continue? [y/N] ",
        record.license_key, record.email, bound
    );
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_records(records: &[LicenseRecord], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No licenses found.");
        return Ok(());
    }
    println!(
        "{:<16} {:<32} {:<10} {:<8} {:<26} {}",
        "KEY", "EMAIL", "TIER", "BANNED", "VALID UNTIL", "HWID"
    );
    for r in records {
        println!(
            "{:<16} {:<32} {:<10} {:<8} {:<26} {}",
            r.license_key,
            r.email,
            r.tier.as_ref(),
            if r.is_banned { "yes" } else { "no" },
            r.valid_until.as_deref().unwrap_or("lifetime"),
            r.bound_hardware_id.as_deref().unwrap_or("-"),
        );
    }
    println!("{} license(s)", records.len());
    Ok(())
}

fn print_record(r: &LicenseRecord) {
    println!("  Key:         {}", r.license_key);
    println!("  Email:       {}", r.email);
    println!("  Tier:        {}", r.tier.as_ref());
    println!("  Duration:    {}", r.duration);
    println!("  Valid until: {}", r.valid_until.as_deref().unwrap_or("lifetime"));
    println!("  Banned:      {}", if r.is_banned { "yes" } else { "no" });
    println!(
        "  HWID:        {}",
        r.bound_hardware_id.as_deref().unwrap_or("Not activated yet")
    );
    println!("  Created:     {}", format_timestamp(r.created_at));
    if let Some(activated_at) = r.activated_at {
        println!("  Activated:   {}", format_timestamp(activated_at));
    }
    if let Some(notes) = &r.notes {
        println!("  Notes:       {}", notes);
    }
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}
