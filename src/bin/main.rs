use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use dexter_sdk::config::EnvironmentConfig;
use dexter_sdk::{
    logging, Coin, CredentialSource, Decimal, DexterClient, DexterClientBuilder, DexterWallet,
    IntentPayload, IntentStatus, NetworkConfig, Uint128, WaitOutcome,
};
use secrecy::ExposeSecret;

const MNEMONIC_ENV: &str = "DEXTER_MNEMONIC";
const PRIVATE_KEY_ENV: &str = "DEXTER_PRIVATE_KEY";
const ACCOUNT_INDEX_ENV: &str = "DEXTER_ACCOUNT_INDEX";

#[derive(Parser)]
#[command(name = "dexter", version, about = "Swap and liquidity intents on XION")]
struct Cli {
    /// Config file to load instead of the default search paths
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seconds to wait for each intent to settle
    #[arg(long, global = true, default_value_t = 60)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect with the configured credential and print the account
    Account,
    /// Generate a fresh account and print its mnemonic
    NewAccount,
    /// Print bank balances of the connected account
    Balances,
    /// Print the resolved network and contract configuration
    Summary,
    /// Swap one denom for another through the trading contract
    Swap {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u128,
        /// Maximum spread as a decimal fraction, e.g. 0.01
        #[arg(long)]
        max_spread: Option<String>,
    },
    /// Provide liquidity to a pool
    AddLiquidity {
        #[arg(long)]
        pool_id: String,
        /// Coin to deposit, e.g. 1000uxion; repeat for each asset
        #[arg(long = "asset", required = true)]
        assets: Vec<String>,
        #[arg(long)]
        slippage_tolerance: Option<String>,
    },
    /// Withdraw liquidity by returning LP tokens
    RemoveLiquidity {
        #[arg(long)]
        pool_id: String,
        #[arg(long)]
        lp_denom: String,
        #[arg(long)]
        amount: u128,
    },
    /// Send native tokens to another address
    Send {
        #[arg(long)]
        to: String,
        /// Coin to send, e.g. 1000uxion; repeat for each denom
        #[arg(long = "amount", required = true)]
        amounts: Vec<String>,
    },
    /// Print the gas a swap would request without submitting it
    EstimateSwap {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u128,
    },
    /// Write a default configuration file
    InitConfig {
        #[arg(long, default_value = "config/dexter.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Command::InitConfig { path } = &cli.command {
        EnvironmentConfig::generate_default_config()
            .save_to_file(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let env_config = match &cli.config {
        Some(path) => EnvironmentConfig::load_from_path(path)?,
        None => EnvironmentConfig::load()?,
    };
    logging::init(&env_config.logging)?;
    let config = NetworkConfig::from_env_config(&env_config)?;
    let timeout = Duration::from_secs(cli.timeout);

    match cli.command {
        Command::NewAccount => {
            let (wallet, phrase) = DexterWallet::generate(&config.account_prefix)?;
            let info = wallet.info()?;
            println!("address:    {}", info.address);
            println!("public key: {}", info.public_key);
            println!("mnemonic:   {}", phrase.expose_secret());
        }
        Command::Summary => {
            let client = DexterClientBuilder::new().with_config(config).build()?;
            println!("{}", serde_json::to_string_pretty(&client.get_summary())?);
        }
        Command::Account => {
            let client = connected_client(config).await?;
            println!("{}", serde_json::to_string_pretty(&client.account())?);
        }
        Command::Balances => {
            let client = connected_client(config).await?;
            for coin in client.balances().await? {
                println!("{}", coin);
            }
        }
        Command::Swap {
            from,
            to,
            amount,
            max_spread,
        } => {
            let max_spread = max_spread.as_deref().map(parse_decimal).transpose()?;
            let payload = IntentPayload::swap(from, to, Uint128::new(amount), max_spread)?;
            run_intent(config, payload, timeout).await?;
        }
        Command::AddLiquidity {
            pool_id,
            assets,
            slippage_tolerance,
        } => {
            let assets = assets
                .iter()
                .map(|a| parse_coin(a))
                .collect::<Result<Vec<_>>>()?;
            let slippage_tolerance = slippage_tolerance
                .as_deref()
                .map(parse_decimal)
                .transpose()?;
            let payload = IntentPayload::add_liquidity(pool_id, assets, slippage_tolerance)?;
            run_intent(config, payload, timeout).await?;
        }
        Command::RemoveLiquidity {
            pool_id,
            lp_denom,
            amount,
        } => {
            let payload = IntentPayload::remove_liquidity(pool_id, lp_denom, Uint128::new(amount))?;
            run_intent(config, payload, timeout).await?;
        }
        Command::Send { to, amounts } => {
            let amounts = amounts
                .iter()
                .map(|a| parse_coin(a))
                .collect::<Result<Vec<_>>>()?;
            let client = connected_client(config).await?;
            let confirmation = tokio::time::timeout(timeout, client.transfer(&to, &amounts))
                .await
                .map_err(|_| anyhow!("transfer not confirmed after {:?}", timeout))??;
            println!("tx={} height={}", confirmation.tx_hash, confirmation.height);
        }
        Command::EstimateSwap { from, to, amount } => {
            let payload = IntentPayload::swap(from, to, Uint128::new(amount), None)?;
            let client = connected_client(config).await?;
            println!("{}", client.estimate_gas(&payload).await?);
        }
        // Written above, before any config file is read
        Command::InitConfig { .. } => {}
    }

    Ok(())
}

fn credential_from_env() -> Result<CredentialSource> {
    if let Ok(phrase) = std::env::var(MNEMONIC_ENV) {
        let index = match std::env::var(ACCOUNT_INDEX_ENV) {
            Ok(index) => index
                .parse()
                .with_context(|| format!("{} must be a number", ACCOUNT_INDEX_ENV))?,
            Err(_) => 0,
        };
        return Ok(CredentialSource::mnemonic_with_index(phrase, index));
    }
    if let Ok(key) = std::env::var(PRIVATE_KEY_ENV) {
        return Ok(CredentialSource::private_key_hex(key));
    }
    bail!("Set {} or {} to connect a wallet", MNEMONIC_ENV, PRIVATE_KEY_ENV)
}

async fn connected_client(config: NetworkConfig) -> Result<DexterClient> {
    let client = DexterClientBuilder::new().with_config(config).build()?;
    client.connect(credential_from_env()?).await?;
    Ok(client)
}

/// Submit one intent and print every status change until it settles
async fn run_intent(config: NetworkConfig, payload: IntentPayload, timeout: Duration) -> Result<()> {
    let client = connected_client(config).await?;

    let mut receiver = client.watch();
    let intent_id = client.submit(payload).await?;
    println!("intent {}", intent_id);

    let printer = async {
        while let Some(status) = receiver.recv().await {
            if status.intent_id == intent_id {
                print_status(&status);
                if status.state.is_terminal() {
                    break;
                }
            }
        }
    };
    let _ = tokio::time::timeout(timeout, printer).await;

    // Zero timeout: report the settled status or abandon without waiting again
    match client.wait_for_terminal(&intent_id, Duration::ZERO).await? {
        WaitOutcome::Settled(status) if status.error.is_some() => {
            Err(anyhow!("intent failed: {}", status.error.unwrap_or_default()))
        }
        WaitOutcome::Settled(_) => Ok(()),
        WaitOutcome::Abandoned(status) => {
            bail!("gave up after {:?} with intent {}", timeout, status.state)
        }
    }
}

fn print_status(status: &IntentStatus) {
    let mut line = format!("  {}", status.state);
    if let Some(hash) = &status.tx_hash {
        line.push_str(&format!(" tx={}", hash));
    }
    if let Some(error) = &status.error {
        line.push_str(&format!(" reason={}", error));
    }
    println!("{}", line);
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| anyhow!("Invalid decimal '{}': {}", s, e))
}

/// Parse `<amount><denom>`, e.g. `1000uxion`
fn parse_coin(s: &str) -> Result<Coin> {
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| anyhow!("Coin '{}' has no denom", s))?;
    let (amount, denom) = s.split_at(split);
    let amount: u128 = amount
        .parse()
        .map_err(|e| anyhow!("Invalid amount in '{}': {}", s, e))?;
    Ok(Coin::new(amount, denom))
}
