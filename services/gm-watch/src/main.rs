use anyhow::{Context, bail};
use async_trait::async_trait;
use gm_api_types::Emoji;
use gm_chain_client::Timer;
use gm_chain_evm::{GmPortalContract, HttpProvider};
use gm_portal_core::{Portal, PortalConfig};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tracing::info;

/// Tokio sleep for the poll loops; the portal runs on a `LocalSet`.
struct TokioTimer;

#[async_trait(?Send)]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Watch,
    Say(Emoji),
}

fn parse_command(args: &[String]) -> anyhow::Result<Command> {
    match args {
        [] => Ok(Command::Watch),
        [cmd] if cmd == "watch" => Ok(Command::Watch),
        [cmd] if cmd == "say" => Ok(Command::Say(Emoji::None)),
        [cmd, emoji] if cmd == "say" => Ok(Command::Say(parse_emoji(emoji)?)),
        _ => bail!("usage: gm-watch [watch | say [smile|neutral|tired]]"),
    }
}

fn parse_emoji(name: &str) -> anyhow::Result<Emoji> {
    match name.to_ascii_lowercase().as_str() {
        "none" | "" => Ok(Emoji::None),
        "smile" => Ok(Emoji::Smile),
        "neutral" => Ok(Emoji::Neutral),
        "tired" => Ok(Emoji::Tired),
        other => bail!("unknown emoji {other:?}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;
    let config = PortalConfig::from_env();

    let local = tokio::task::LocalSet::new();
    local.run_until(run(config, command)).await
}

async fn run(config: PortalConfig, command: Command) -> anyhow::Result<()> {
    let provider = Rc::new(HttpProvider::new(config.rpc_url.clone()));
    info!(
        endpoint = provider.endpoint(),
        contract = %config.contract_address,
        "gm-watch starting"
    );

    let contract = GmPortalContract::new(Some(provider.clone()), TokioTimer, &config.contract_address)
        .context("failed to bind the portal contract")?
        .with_gas_limit(config.gas_limit)
        .with_receipt_poll_interval(config.receipt_poll_interval);
    let portal = Rc::new(Portal::new(config, Some(provider), Some(contract)));
    log_new_greetings(&portal);

    let status = portal.mount().await;
    info!(?status, "authorization checked");
    // A node without unlocked accounts still has a readable feed.
    portal.sync().await;

    if let Command::Say(emoji) = command {
        portal.select_emoji(emoji);
        let receipt = portal.submit().await.context("gm failed")?;
        info!(tx = %receipt.tx_hash, block = receipt.block_number, "gm mined");
    }

    tokio::select! {
        _ = portal.pump_events(&TokioTimer) => info!("no subscriptions left"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("shutting down");
        }
    }
    portal.teardown();
    Ok(())
}

fn log_new_greetings<P, G>(portal: &Rc<Portal<P, G>>)
where
    P: gm_chain_client::WalletProvider + 'static,
    G: gm_chain_client::GreetingGateway + 'static,
{
    let logged = Cell::new(0usize);
    let weak = Rc::downgrade(portal);
    portal.updates().observe(move || {
        let Some(portal) = weak.upgrade() else {
            return;
        };
        let greetings = portal.snapshot().greetings;
        for greeting in greetings.iter().skip(logged.get()) {
            info!(
                sender = %greeting.sender,
                timestamp_ms = greeting.timestamp_epoch_ms,
                message = %greeting.message,
                "gm"
            );
        }
        logged.set(greetings.len());
    });
}
