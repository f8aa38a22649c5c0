//! Pantry CLI - inspect and edit the local cart session.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! pantry show
//!
//! # Add two units of a product
//! pantry add ladoo-250g --name "Coconut Ladoo" --price 125.50 --quantity 2
//!
//! # Change or remove a line
//! pantry update ladoo-250g 3
//! pantry remove ladoo-250g
//!
//! # Sign in (pushes the guest cart to the backend) and out (wipes the cart)
//! pantry login --token "$JWT"
//! pantry logout
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart
//! - `add`, `remove`, `update`, `clear` - Edit the cart
//! - `fetch` - Load the server cart
//! - `sync` - Push the guest cart to the backend
//! - `login`, `logout` - Manage the stored credential

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use pantry_cart::{CartConfig, CartStore};
use pantry_core::ItemId;
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "pantry")]
#[command(author, version, about = "Pantry cart tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart
    Show {
        /// Print the cart as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a product to the cart
    Add(AddArgs),
    /// Remove a product from the cart
    Remove {
        /// Product ID
        id: ItemId,
    },
    /// Set the quantity of a product already in the cart
    Update {
        /// Product ID
        id: ItemId,

        /// New quantity (must be at least 1)
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
    /// Replace the local cart with the server cart
    Fetch,
    /// Push the guest cart to the backend
    Sync,
    /// Store a bearer token and reconcile the guest cart
    Login {
        /// Bearer token issued by the backend
        #[arg(short, long)]
        token: String,
    },
    /// Forget the bearer token and wipe the cart
    Logout,
}

#[derive(Args)]
struct AddArgs {
    /// Product ID
    id: ItemId,

    /// Product display name
    #[arg(short, long)]
    name: String,

    /// Unit price
    #[arg(short, long)]
    price: Decimal,

    /// Number of units to add
    #[arg(short, long, default_value_t = 1)]
    quantity: u32,

    /// Product image URL
    #[arg(long)]
    image: Option<String>,

    /// Product category
    #[arg(long)]
    category: Option<String>,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pantry_cart=info,pantry_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration first (needed for Sentry init)
    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = init_sentry(&config);
    init_tracing();

    let result = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), CliError> {
    let store = CartStore::from_config(config)?;

    match cli.command {
        Commands::Show { json } => commands::cart::show(&store, json)?,
        Commands::Add(args) => {
            let mut product = pantry_core::ProductDescriptor::new(args.id, args.name, args.price)
                .with_quantity(args.quantity);
            if let Some(image) = args.image {
                product = product.with_image(image);
            }
            if let Some(category) = args.category {
                product = product.with_category(category);
            }
            commands::cart::add(&store, product).await;
        }
        Commands::Remove { id } => commands::cart::remove(&store, &id).await,
        Commands::Update { id, quantity } => commands::cart::update(&store, &id, quantity).await,
        Commands::Clear => commands::cart::clear(&store).await,
        Commands::Fetch => commands::cart::fetch(&store).await,
        Commands::Sync => commands::session::sync(&store).await,
        Commands::Login { token } => commands::session::login(&store, token).await?,
        Commands::Logout => commands::session::logout(&store)?,
    }

    store.close()?;
    Ok(())
}
