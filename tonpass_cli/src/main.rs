use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tonpass_core::PaidUsersLedger;
use tonpass_server::store::{AnyStore, DEFAULT_PAID_USERS_FILE};

#[derive(Parser)]
#[command(name = "tonpass-cli", about = "Admin CLI for the tonpass paid-user store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// SQLite URL; takes precedence over --file
    #[arg(long, value_parser, env = "DATABASE_URL")]
    database_url: Option<String>,
    /// JSON paid-user file
    #[arg(long, env = "PAID_USERS_FILE", default_value = DEFAULT_PAID_USERS_FILE)]
    file: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List every paid user with the address that paid
    List,
    /// Drop a user's paid record so they have to pay again
    Evict { user_id: String },
    /// Export paid users to CSV path
    ExportCsv { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tonpass_server::init_tracing();
    let cli = Cli::parse();
    let store = AnyStore::open(cli.database_url.as_deref(), &cli.file).await?;
    let ledger = PaidUsersLedger::new(store);

    match cli.command {
        Commands::List => {
            let users = ledger.all().await?;
            for (user_id, sender) in &users {
                println!("{user_id:>12} {sender}");
            }
            println!("{} paid user(s)", users.len());
        }
        Commands::Evict { user_id } => {
            if ledger.evict(&user_id).await? {
                println!("Evicted {user_id}");
            } else {
                println!("{user_id} has no paid record");
            }
        }
        Commands::ExportCsv { path } => {
            let users = ledger.all().await?;
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record(["user_id", "sender"])?;
            for (user_id, sender) in &users {
                wtr.write_record([user_id, sender])?;
            }
            wtr.flush()?;
            println!("Exported {} rows to {}", users.len(), path.display());
        }
    }

    Ok(())
}
