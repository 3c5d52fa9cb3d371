use std::{fs::File, io, sync::Mutex, time::Duration};

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::status::DefaultStatus;

/// How to reach the MPD server
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum MpdNetwork {
    Tcp,
    Unix,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Your Slack API token
    #[clap(long)]
    pub api_token: String,
    /// Full URL to API path for the Slack team (e.g. "https://team.slack.com/api/")
    #[clap(long)]
    pub api_url: String,
    /// The Slack version uid, sent along with every request
    #[clap(long)]
    pub version_uid: String,
    /// Transport used to connect to MPD
    #[clap(long, value_enum, default_value_t = MpdNetwork::Tcp)]
    pub mpd_network: MpdNetwork,
    /// MPD address: "host:port" for tcp (":port" means localhost), a socket path for unix
    #[clap(long, default_value = ":6600")]
    pub mpd_address: String,
    /// Password sent to MPD after connecting
    #[clap(long)]
    pub mpd_password: Option<String>,
    /// Emoji shown while nothing is playing
    #[clap(long, default_value = ":question:")]
    pub default_emoji: String,
    /// Status text shown while nothing is playing
    #[clap(long, default_value = "I don't know")]
    pub default_text: String,
    /// Ping MPD every X seconds so the connection is not dropped
    #[clap(long, default_value_t = 30)]
    pub keepalive_every: u64,
    /// Give up on a Slack request after X seconds. Requests never time out if not specified.
    #[clap(long)]
    pub request_timeout: Option<u64>,
    /// File to write the log to. If not specified, logs will be written to stderr.
    #[clap(long, short)]
    log_file: Option<String>,
}

impl Args {
    /// Build the tracing subscriber using parameters from the command line arguments
    ///
    /// # Panics
    ///
    /// Panics if the log file cannot be opened.
    pub fn init_tracing_subscriber(&self) {
        let builder = tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env());

        match self.log_file.as_ref() {
            None => builder.with_writer(io::stderr).init(),
            Some(f) => builder
                .with_writer(Mutex::new(File::create(f).unwrap()))
                .init(),
        }
    }

    pub fn default_status(&self) -> DefaultStatus {
        DefaultStatus {
            emoji: self.default_emoji.clone(),
            text: self.default_text.clone(),
        }
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_every.max(1))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from([
            "mpdstatus",
            "--api-token",
            "xoxs-token",
            "--api-url",
            "https://team.slack.com/api/",
            "--version-uid",
            "abc123",
        ]);
        assert_eq!(args.mpd_network, MpdNetwork::Tcp);
        assert_eq!(args.mpd_address, ":6600");
        assert_eq!(args.mpd_password, None);
        assert_eq!(args.keepalive_interval(), Duration::from_secs(30));
        assert_eq!(args.request_timeout(), None);
        assert_eq!(
            args.default_status(),
            DefaultStatus {
                emoji: ":question:".to_owned(),
                text: "I don't know".to_owned(),
            }
        );
    }

    #[test]
    fn unix_socket() {
        let args = Args::parse_from([
            "mpdstatus",
            "--api-token",
            "t",
            "--api-url",
            "u",
            "--version-uid",
            "v",
            "--mpd-network",
            "unix",
            "--mpd-address",
            "/run/mpd/socket",
            "--request-timeout",
            "5",
        ]);
        assert_eq!(args.mpd_network, MpdNetwork::Unix);
        assert_eq!(args.mpd_address, "/run/mpd/socket");
        assert_eq!(args.request_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn slack_settings_are_required() {
        assert!(Args::try_parse_from(["mpdstatus", "--api-token", "t"]).is_err());
    }
}
