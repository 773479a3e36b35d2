//! Configuration for the benchmark runner.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `CTLBENCH__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! Environment variables use double underscores (`__`) to denote nested configuration
//! structures. For example:
//!
//! - `CTLBENCH__DURATION=5m` runs the scenario for five minutes
//! - `CTLBENCH__SCENARIO__TARGET_RATE=50` requests 50 node listings per second
//! - `CTLBENCH__CLUSTER__CONTROL_NODE=10.0.0.1` sets the control service address
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! duration: 5m
//!
//! scenario:
//!   kind: read_request_load
//!   target_rate: 50
//!
//! cluster:
//!   control_node: 10.0.0.1
//! ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "CTLBENCH__";

/// The cluster under benchmark.
///
/// Used in: [`Config::cluster`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Cluster {
    /// Address of the node running the control service.
    ///
    /// Defaults to `127.0.0.1`.
    pub control_node: IpAddr,

    /// Port of the control service's REST API.
    ///
    /// Defaults to `4523`.
    pub control_port: u16,

    /// Public addresses of the other nodes in the cluster.
    ///
    /// The control node is always considered part of the cluster.
    pub nodes: Vec<IpAddr>,
}

impl Cluster {
    /// The base URL of the control service's REST API.
    pub fn control_service_url(&self) -> String {
        let addr = SocketAddr::new(self.control_node, self.control_port);
        format!("http://{addr}")
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Self {
            control_node: IpAddr::V4(Ipv4Addr::LOCALHOST),
            control_port: 4523,
            nodes: Vec::new(),
        }
    }
}

/// The kind of load to put on the cluster.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Read requests against the control service at a target rate.
    ReadRequestLoad,
    /// No load at all.
    NoLoad,
}

/// Scenario configuration.
///
/// Used in: [`Config::scenario`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Scenario {
    /// Which scenario to run.
    ///
    /// Defaults to `read_request_load`.
    pub kind: ScenarioKind,

    /// Requests per second the scenario must sustain.
    ///
    /// Defaults to `10`.
    pub target_rate: f64,

    /// Time between two checks of the achieved request rate.
    ///
    /// Defaults to `1s`.
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,

    /// Time between two batches of requests.
    ///
    /// Defaults to `1s`.
    #[serde(with = "humantime_serde")]
    pub request_interval: Duration,

    /// Number of seconds the achieved request rate is averaged over.
    ///
    /// Defaults to `5`.
    pub window_size: usize,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            kind: ScenarioKind::ReadRequestLoad,
            target_rate: 10.0,
            check_interval: Duration::from_secs(1),
            request_interval: Duration::from_secs(1),
            window_size: ctlbench_scenario::rate::DEFAULT_WINDOW_SIZE,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// Dump out JSON lines.
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::error::Error for FormatParseError {}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output, unless overridden by `RUST_LOG`.
    ///
    /// Defaults to `info`.
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// Defaults to `auto`.
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Benchmark runner configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// The cluster to put under load.
    pub cluster: Cluster,

    /// The scenario to run.
    pub scenario: Scenario,

    /// How long to keep the scenario running.
    ///
    /// Defaults to `1m`.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster: Cluster::default(),
            scenario: Scenario::default(),
            duration: Duration::from_secs(60),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from defaults, an optional YAML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}
