use clap::Parser;
use gas_oracle::{
    constants::{API_KEY_ENV_VAR, ETHERSCAN_API_URL},
    GasPriceTracker, OracleConfig, ProviderError, RefreshState,
};
use thiserror::Error;

/// Live Ethereum gas price from Etherscan
#[derive(Debug, Parser)]
#[command(name = "gas-oracle", version, about)]
struct Cli {
    /// Etherscan API key
    #[arg(long, env = API_KEY_ENV_VAR, hide_env_values = true)]
    api_key: Option<String>,

    /// Etherscan API base URL
    #[arg(long, default_value = ETHERSCAN_API_URL)]
    api_url: String,

    /// Fetch once, print the price and exit
    #[arg(long)]
    once: bool,

    /// Print one JSON object per update instead of text
    #[arg(long)]
    json: bool,
}

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    const fn exit_code(&self) -> i32 {
        match self {
            Self::Provider(ProviderError::InvalidConfig(_)) => 2,
            Self::Provider(ProviderError::MissingApiKey) => 3,
            Self::Provider(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gas_oracle=info".into()),
        )
        .init();

    if let Err(error) = run(Cli::parse()).await {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = OracleConfig::default()
        .with_api_key(cli.api_key)
        .with_api_url(cli.api_url);
    let tracker = GasPriceTracker::new(config)?;

    if cli.once {
        let price = tracker.fetch_once().await?;
        if cli.json {
            println!("{}", serde_json::to_string(&price)?);
        } else {
            println!("Current Gas Price: {}", price);
        }
        return Ok(());
    }

    let handle = tracker.start();
    let mut states = handle.subscribe_state();
    print_state(&states.borrow_and_update(), cli.json)?;

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                print_state(&state, cli.json)?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn print_state(state: &RefreshState, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string(&state.display())?);
    } else {
        println!("{}\n", state.display());
    }
    Ok(())
}
