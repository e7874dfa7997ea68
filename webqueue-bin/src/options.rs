use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use webqueue_lib::{Priority, ServiceConfig};

use crate::verbosity::Verbosity;

const HELP_MSG_CONFIG_FILE: &str = "Configuration file to use.

The file uses TOML and may contain any of these keys:
user_agent, server_host, default_request_interval, request_intervals,
token_endpoint, count_pending_interval, timeout and proxy.
Command line flags take precedence over the file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum PriorityLevel {
    Normal,
    High,
}

impl From<PriorityLevel> for Priority {
    fn from(level: PriorityLevel) -> Self {
        match level {
            PriorityLevel::Normal => Priority::Normal,
            PriorityLevel::High => Priority::High,
        }
    }
}

/// webqueue sends HTTP requests while keeping a minimum interval between
/// requests to the same host, and prints one JSON object per response.
#[derive(Parser, Debug)]
#[command(version, about)]
pub(crate) struct WebqueueOptions {
    /// URLs to request
    #[arg(required = true, value_name = "URL")]
    pub(crate) urls: Vec<Url>,

    /// Configuration file to use
    #[arg(short, long = "config", value_name = "PATH", long_help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) verbose: Verbosity,

    /// HTTP method
    #[arg(short = 'X', long, value_enum, default_value_t = HttpMethod::Get)]
    pub(crate) method: HttpMethod,

    /// Request body for POST and PUT
    #[arg(short, long)]
    pub(crate) data: Option<String>,

    /// Response type used to parse the body, e.g. `json` or `xml`
    #[arg(short = 't', long = "type", value_name = "TYPE", conflicts_with = "raw")]
    pub(crate) parse_type: Option<String>,

    /// Print the response body without parsing it
    #[arg(long)]
    pub(crate) raw: bool,

    /// Priority tier of the requests
    #[arg(long, value_enum)]
    pub(crate) priority: Option<PriorityLevel>,

    /// Put the requests in front of their queues
    #[arg(long)]
    pub(crate) important: bool,

    /// Bypass caches
    #[arg(long)]
    pub(crate) refresh: bool,

    /// Bearer token for requests that require authentication
    #[arg(long, env = "WEBQUEUE_TOKEN", hide_env_values = true)]
    pub(crate) token: Option<String>,

    /// Minimum interval between requests to the same host, e.g. `500ms`
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub(crate) interval: Option<Duration>,

    /// Timeout of a single request, e.g. `30s`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) timeout: Option<Duration>,

    /// User agent to send
    #[arg(short, long)]
    pub(crate) user_agent: Option<String>,
}

impl WebqueueOptions {
    /// Read the configuration file, if any, and apply command line overrides
    pub(crate) fn service_config(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config_file {
            Some(path) => ServiceConfig::load(path)
                .with_context(|| format!("Cannot load configuration file `{}`", path.display()))?,
            None => ServiceConfig::default(),
        };

        if let Some(interval) = self.interval {
            config.default_request_interval = interval;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = Some(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent.clone_from(user_agent);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn verify_app() {
        use clap::CommandFactory;
        WebqueueOptions::command().debug_assert();
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "default_request_interval = \"2s\"\nuser_agent = \"from-file/1.0\"\ntimeout = \"10s\""
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let opts = WebqueueOptions::parse_from([
            "webqueue",
            "--config",
            path,
            "--interval",
            "250ms",
            "https://musicbrainz.org/ws/2/artist",
        ]);
        let config = opts.service_config().unwrap();

        assert_eq!(config.default_request_interval, Duration::from_millis(250));
        assert_eq!(config.user_agent, "from-file/1.0");
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_missing_config_file() {
        let opts = WebqueueOptions::parse_from([
            "webqueue",
            "--config",
            "/does/not/exist.toml",
            "https://musicbrainz.org/",
        ]);
        assert!(opts.service_config().is_err());
    }

    #[test]
    fn test_raw_conflicts_with_type() {
        let result = WebqueueOptions::try_parse_from([
            "webqueue",
            "--raw",
            "--type",
            "xml",
            "https://musicbrainz.org/",
        ]);
        assert!(result.is_err());
    }
}
