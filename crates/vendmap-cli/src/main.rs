mod account;
mod machines;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vendmap_client::VendmapClient;

use crate::machines::MachineCommands;

#[derive(Debug, Parser)]
#[command(name = "vendmap-cli")]
#[command(about = "Campus vending-machine directory command line interface")]
struct Cli {
    /// Base URL of the vendmap server
    #[arg(
        long,
        global = true,
        env = "VENDMAP_SERVER_URL",
        default_value = "http://localhost:3001"
    )]
    server: String,

    /// Session token (as printed by `login`)
    #[arg(long, global = true, env = "VENDMAP_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations (uses DATABASE_URL)
    Migrate,
    /// Browse and edit vending machines
    Machines {
        #[command(subcommand)]
        command: MachineCommands,
    },
    /// Log in and print a session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "VENDMAP_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and print a session token
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "VENDMAP_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        username: Option<String>,
    },
    /// Search campus buildings by name prefix
    Buildings { query: String },
}

impl Cli {
    fn client(&self) -> anyhow::Result<VendmapClient> {
        let client = VendmapClient::new(&self.server)?;
        Ok(match &self.token {
            Some(token) => client.with_token(token.clone()),
            None => client,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match &cli.command {
        Some(Commands::Migrate) => run_migrate().await?,
        Some(Commands::Machines { command }) => {
            machines::run(&cli.client()?, command).await?;
        }
        Some(Commands::Login { email, password }) => {
            account::run_login(cli.client()?, email, password).await?;
        }
        Some(Commands::Register {
            email,
            password,
            username,
        }) => {
            account::run_register(cli.client()?, email, password, username.as_deref()).await?;
        }
        Some(Commands::Buildings { query }) => run_buildings(&cli.client()?, query).await?,
        None => println!("vendmap-cli: run with --help for available commands"),
    }

    Ok(())
}

async fn run_migrate() -> anyhow::Result<()> {
    let config = vendmap_core::load_app_config()?;
    let pool_config = vendmap_db::PoolConfig::from_app_config(&config);
    let pool = vendmap_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = vendmap_db::run_migrations(&pool).await?;
    println!("applied {applied} migration(s)");
    Ok(())
}

async fn run_buildings(client: &VendmapClient, query: &str) -> anyhow::Result<()> {
    let search = client.search_buildings(query).await?;

    if search.suggestions.is_empty() {
        println!("no buildings match '{query}'");
        return Ok(());
    }

    println!("{:<10}{:>12}{:>14}", "NAME", "LAT", "LNG");
    for building in &search.suggestions {
        let marker = if search.exact.as_ref() == Some(building) {
            " *"
        } else {
            ""
        };
        println!(
            "{:<10}{:>12.6}{:>14.6}{marker}",
            building.name, building.lat, building.lng
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests;
