//! Diagnostic tool - Check configuration without touching the network
//!
//! Run with: cargo run --bin diagnose

use std::env;
use std::path::Path;

use token_prices::chains::ChainId;
use token_prices::config::{CacheBackend, Config};

fn mask(url: &str) -> String {
    let chars: Vec<char> = url.chars().collect();
    if chars.len() > 50 {
        let head: String = chars[..30].iter().collect();
        let tail: String = chars[chars.len() - 15..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        url.to_string()
    }
}

fn main() {
    println!("🔍 TOKEN PRICES DIAGNOSTIC CHECK\n");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("  ❌ Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    println!("═══════════════════════════════════════════════════");
    println!("                  CONFIGURATION                     ");
    println!("═══════════════════════════════════════════════════\n");

    let checks = [
        ("PRICE_API_URL", "Price API base URL"),
        ("PRICE_HISTORY_DAYS", "Daily history points per token"),
        ("PRICE_BATCH_SIZE", "Addresses per price request"),
        ("CACHE_BACKEND", "file or memory"),
        ("CACHE_DIR", "Directory for file-backed cache"),
        ("MAX_LP_DEPTH", "LP-of-LP nesting limit"),
        ("BIND_ADDR", "HTTP listen address"),
    ];

    for (key, desc) in checks {
        let marker = if env::var(key).is_ok() { "(from env)" } else { "(default)" };
        println!("  {}: {}", key, marker);
        println!("    └─ {}\n", desc);
    }

    println!("═══════════════════════════════════════════════════");
    println!("                     NETWORKS                       ");
    println!("═══════════════════════════════════════════════════\n");

    let rpc_urls = config.chain_rpc_urls();
    for chain in ChainId::ALL {
        match rpc_urls.get(&chain) {
            Some(url) => println!("  {:<10} ✅ {}", chain.slug(), mask(url)),
            None => println!("  {:<10} ⚠️  {} not set, LP tokens unpriceable", chain.slug(), chain.rpc_env_var()),
        }
    }

    println!("\n═══════════════════════════════════════════════════");
    println!("                     STATUS                         ");
    println!("═══════════════════════════════════════════════════\n");

    if config.cache_backend == CacheBackend::File && !Path::new(&config.cache_dir).exists() {
        println!("  📁 Cache directory {} will be created on first write", config.cache_dir);
    }

    match config.validate() {
        Ok(()) => println!("  ✅ Configuration is valid"),
        Err(e) => {
            println!("  ❌ {}", e);
            std::process::exit(1);
        }
    }
}
