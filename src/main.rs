//! Token Prices - price resolution service
//!
//! Run with: cargo run -- serve

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use token_prices::build_resolver;
use token_prices::chains::ChainId;
use token_prices::config::Config;
use token_prices::handler::{fetch_token_prices, RequestOptions};
use token_prices::server;

#[derive(Parser)]
#[command(name = "token-prices", version, about = "Token price resolution with recursive LP pricing")]
struct Cli {
    /// Load configuration from a TOML file instead of the environment
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP service
    Serve,
    /// Resolve prices for a set of tokens and print the JSON body
    Fetch {
        #[arg(long, value_parser = parse_chain)]
        chain: ChainId,
        /// Comma separated token addresses
        #[arg(long, value_delimiter = ',')]
        tokens: Vec<String>,
        /// Keep full price histories in the output
        #[arg(long)]
        history: bool,
    },
    /// Print the current snapshot of every cached token on a chain
    Refresh {
        #[arg(long, value_parser = parse_chain)]
        chain: ChainId,
    },
    /// Print the configuration summary
    Config {
        /// Also write the effective configuration as TOML
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn parse_chain(raw: &str) -> std::result::Result<ChainId, String> {
    raw.parse().map_err(|e: color_eyre::eyre::Report| e.to_string())
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 💰 TOKEN PRICES - Price Resolution Service").cyan().bold()
    );
    println!(
        "{}",
        style("    Cached Prices | Recursive LP Pricing | 7 Networks").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file or --config");
        return Err(e);
    }

    Ok(config)
}

fn print_body(body: Option<String>) {
    println!("{}", body.unwrap_or_else(|| "null".to_string()));
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("token_prices=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Serve => {
            print_banner();
            config.print_summary();
            println!();

            let addr = config.socket_addr()?;
            let resolver = Arc::new(build_resolver(&config)?);
            server::serve(resolver, addr).await?;
        }
        Command::Fetch { chain, tokens, history } => {
            let resolver = build_resolver(&config)?;
            let options = RequestOptions {
                include_history: history,
            };
            let addresses = (!tokens.is_empty()).then_some(tokens);
            print_body(fetch_token_prices(&resolver, chain, addresses.as_deref(), options).await);
        }
        Command::Refresh { chain } => {
            let resolver = build_resolver(&config)?;
            print_body(fetch_token_prices(&resolver, chain, None, RequestOptions::default()).await);
        }
        Command::Config { write } => {
            print_banner();
            config.print_summary();
            if let Some(path) = write {
                config.save_to_file(&path)?;
                println!("{} Wrote {}", style("✓").green(), path.display());
            }
        }
    }

    Ok(())
}
