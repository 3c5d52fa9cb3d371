use anyhow::{Context as _, Result};
use clap::Parser as _;
use tokio::{select, signal};

use crate::{
    engine::SyncEngine,
    keepalive::spawn_keepalive,
    mpd::MpdConnection,
    playback::{player_events, MpdPlayback},
    slack::SlackClient,
};

mod args;
mod engine;
mod keepalive;
mod mpd;
mod playback;
mod slack;
mod status;
#[cfg(test)]
mod testing;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = args::Args::parse();
    args.init_tracing_subscriber();

    let slack = SlackClient::new(
        args.api_token.as_str(),
        args.api_url.as_str(),
        args.version_uid.as_str(),
        args.request_timeout(),
    )
    .context("Failed to create Slack client")?;

    let password = args.mpd_password.as_deref();
    let commands = MpdConnection::connect(args.mpd_network, &args.mpd_address, password)
        .await
        .context("Failed to connect to mpd")?;
    let source = MpdPlayback::new(commands);
    let _keepalive = spawn_keepalive(source.clone(), args.keepalive_interval());

    let watcher = MpdConnection::connect(args.mpd_network, &args.mpd_address, password)
        .await
        .context("Failed to create mpd watcher")?;

    let mut engine = SyncEngine::new(source, slack, args.default_status());
    let result = select! {
        result = engine.run(player_events(watcher)) => result,
        interrupted = signal::ctrl_c() => {
            interrupted.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Interrupted, shutting down");
            return Ok(());
        }
    };
    tracing::error!(last_sent = ?engine.last_sent(), "Status sync stopped");
    result
}
