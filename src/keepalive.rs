use std::time::Duration;

use tokio::{
    task::{spawn, JoinHandle},
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::playback::PlaybackSource;

/// Ping `source` every `period` so neither MPD nor anything in between drops the idle
/// connection.
///
/// Failed pings are logged and otherwise ignored; the task only ends when aborted or when the
/// runtime shuts down.
pub fn spawn_keepalive<P>(source: P, period: Duration) -> JoinHandle<()>
where
    P: PlaybackSource + Send + Sync + 'static,
{
    tracing::debug!(?period, "Starting MPD keepalive");
    spawn(async move {
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            match source.ping().await {
                Ok(()) => tracing::trace!("Pinged MPD"),
                Err(e) => tracing::warn!(?e, "Keepalive ping failed"),
            }
        }
    })
}
