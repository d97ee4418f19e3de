//! Canopy CLI - Database migrations and metafield tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! canopy-cli migrate
//!
//! # List the app's metafields for an installed shop
//! canopy-cli metafields list --shop my-shop.myshopify.com
//!
//! # Read, write or delete one key
//! canopy-cli metafields get --shop my-shop.myshopify.com usage_count
//! canopy-cli metafields set --shop my-shop.myshopify.com plan essential
//! canopy-cli metafields set --shop my-shop.myshopify.com cart_enabled true -t boolean
//! canopy-cli metafields delete --shop my-shop.myshopify.com product_id
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `metafields` - Inspect and repair app metafields
//! - `shops` - List shops with a stored session

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "canopy-cli")]
#[command(author, version, about = "Canopy CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// List shops with a stored offline session
    Shops,
    /// Inspect or change app metafields
    Metafields {
        /// Shop domain (e.g. my-shop.myshopify.com)
        #[arg(short, long, global = true)]
        shop: Option<String>,

        #[command(subcommand)]
        action: MetafieldAction,
    },
}

#[derive(Subcommand)]
enum MetafieldAction {
    /// List the first 100 metafields in the app namespace
    List,
    /// Print one metafield
    Get {
        /// Metafield key
        key: String,
    },
    /// Write one metafield
    Set {
        /// Metafield key
        key: String,

        /// Value in its wire form (e.g. `true`, `42`, `{"a":1}`)
        value: String,

        /// Metafield type tag
        #[arg(short = 't', long = "type", default_value = "single_line_text_field")]
        type_tag: String,
    },
    /// Delete one metafield
    Delete {
        /// Metafield key
        key: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Shops => commands::metafields::shops().await?,
        Commands::Metafields { shop, action } => {
            let shop = shop.ok_or(commands::metafields::MetafieldCommandError::MissingShop)?;
            match action {
                MetafieldAction::List => commands::metafields::list(&shop).await?,
                MetafieldAction::Get { key } => commands::metafields::get(&shop, &key).await?,
                MetafieldAction::Set {
                    key,
                    value,
                    type_tag,
                } => commands::metafields::set(&shop, &key, &value, &type_tag).await?,
                MetafieldAction::Delete { key } => {
                    commands::metafields::delete(&shop, &key).await?;
                }
            }
        }
    }
    Ok(())
}
