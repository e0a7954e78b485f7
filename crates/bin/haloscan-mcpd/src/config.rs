use clap::{Parser, builder::BoolishValueParser};
use haloscan_core::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use haloscan_core::control::plan::{DEFAULT_COMPETITOR_LINE_COUNT, DEFAULT_LINE_COUNT};
use haloscan_core::control::{DEFAULT_OUTPUT_BUDGET, PlanPolicy, PolicyError};
use haloscan_core::{ClientConfig, ControlConfig, validate};
use haloscan_model::RankRange;
use haloscan_http::DEFAULT_MAX_BODY_BYTES;
use haloscan_mcp::server::DEFAULT_SSE_KEEP_ALIVE;
use haloscan_model::schema::{DEFAULT_LANG, UPSTREAM_MAX_LINE_COUNT};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";
const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_TRANCHES: &str = "1-10,11-20,21-50";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 180;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "haloscan-mcpd", version, about = "Haloscan SEO MCP and HTTP daemon.")]
#[allow(clippy::struct_excessive_bools)]
struct CliArgs {
    #[arg(long, env = "HALOSCAN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "HALOSCAN_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(
        long,
        env = "HALOSCAN_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT.as_secs()
    )]
    timeout_secs: u64,

    #[arg(long, env = "HALOSCAN_LINE_COUNT", default_value_t = DEFAULT_LINE_COUNT)]
    line_count: u32,

    #[arg(
        long,
        env = "HALOSCAN_COMPETITOR_LINE_COUNT",
        default_value_t = DEFAULT_COMPETITOR_LINE_COUNT
    )]
    competitor_line_count: u32,

    #[arg(long, env = "HALOSCAN_TRANCHES", default_value = DEFAULT_TRANCHES)]
    tranches: String,

    #[arg(long, env = "HALOSCAN_LANG", default_value = DEFAULT_LANG)]
    lang: String,

    #[arg(
        long,
        env = "HALOSCAN_OUTPUT_BUDGET",
        default_value_t = DEFAULT_OUTPUT_BUDGET
    )]
    output_budget: usize,

    #[arg(
        long = "stdio",
        env = "HALOSCAN_ENABLE_STDIO",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "HALOSCAN_MCP_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(
        long,
        env = "HALOSCAN_HTTP_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    http_serve: bool,

    #[arg(long, env = "HALOSCAN_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(long, env = "HALOSCAN_HTTP_ADDR", default_value = DEFAULT_HTTP_ADDR)]
    http_addr: SocketAddr,

    #[arg(
        long,
        env = "HALOSCAN_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_HTTP_TIMEOUT_SECS
    )]
    http_timeout_secs: u64,

    #[arg(
        long,
        env = "HALOSCAN_HTTP_MAX_BODY_BYTES",
        default_value_t = DEFAULT_MAX_BODY_BYTES
    )]
    http_max_body_bytes: usize,

    /// Seconds between SSE keep-alive pings on the MCP transport, 0 disables them.
    #[arg(
        long,
        env = "HALOSCAN_MCP_SSE_KEEP_ALIVE_SECS",
        default_value_t = DEFAULT_SSE_KEEP_ALIVE.as_secs()
    )]
    mcp_sse_keep_alive_secs: u64,

    #[arg(long, env = "HALOSCAN_LOG", default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct HaloscanConfig {
    pub client: ClientConfig,
    pub control: ControlConfig,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub http_serve: bool,
    pub mcp_http_addr: SocketAddr,
    pub mcp_sse_keep_alive: Option<Duration>,
    pub http_addr: SocketAddr,
    pub http_timeout: Duration,
    pub http_max_body_bytes: usize,
    pub log_filter: String,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl HaloscanConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

impl TryFrom<CliArgs> for HaloscanConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let api_key = args
            .api_key
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingSetting("HALOSCAN_API_KEY"))?;

        let base_url = parse_base_url(&args.base_url)?;

        if args.timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "HALOSCAN_TIMEOUT_SECS",
                value: args.timeout_secs.to_string(),
            });
        }
        if args.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "HALOSCAN_HTTP_TIMEOUT_SECS",
                value: args.http_timeout_secs.to_string(),
            });
        }

        if args.http_max_body_bytes == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "HALOSCAN_HTTP_MAX_BODY_BYTES",
                value: args.http_max_body_bytes.to_string(),
            });
        }
        if !(1..=UPSTREAM_MAX_LINE_COUNT).contains(&args.competitor_line_count) {
            return Err(ConfigError::InvalidSetting {
                name: "HALOSCAN_COMPETITOR_LINE_COUNT",
                value: args.competitor_line_count.to_string(),
            });
        }

        let lang = validate::lang(&args.lang).map_err(|_| ConfigError::InvalidSetting {
            name: "HALOSCAN_LANG",
            value: args.lang.clone(),
        })?;
        let default_output_budget =
            validate::output_budget(args.output_budget).map_err(|_| {
                ConfigError::InvalidSetting {
                    name: "HALOSCAN_OUTPUT_BUDGET",
                    value: args.output_budget.to_string(),
                }
            })?;

        let tranches = parse_tranches(&args.tranches)?;
        let policy = PlanPolicy::new(tranches, args.line_count, lang).map_err(|err| match err {
            PolicyError::LineCount(value) => ConfigError::InvalidSetting {
                name: "HALOSCAN_LINE_COUNT",
                value: value.to_string(),
            },
            PolicyError::NoTranches | PolicyError::InvalidTranche(_) => {
                ConfigError::InvalidSetting {
                    name: "HALOSCAN_TRANCHES",
                    value: args.tranches.clone(),
                }
            }
        })?
        .with_competitor_line_count(args.competitor_line_count);

        if !args.enable_stdio && !args.mcp_serve && !args.http_serve {
            return Err(ConfigError::InvalidSetting {
                name: "HALOSCAN_MCP_SERVE",
                value: "false (no transport enabled)".to_string(),
            });
        }

        if args.log_filter.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "HALOSCAN_LOG",
                value: args.log_filter,
            });
        }

        Ok(Self {
            client: ClientConfig::new(api_key, base_url)
                .with_timeout(Duration::from_secs(args.timeout_secs)),
            control: ControlConfig {
                policy,
                default_output_budget,
            },
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            http_serve: args.http_serve,
            mcp_http_addr: args.mcp_http_addr,
            mcp_sse_keep_alive: (args.mcp_sse_keep_alive_secs > 0)
                .then(|| Duration::from_secs(args.mcp_sse_keep_alive_secs)),
            http_addr: args.http_addr,
            http_timeout: Duration::from_secs(args.http_timeout_secs),
            http_max_body_bytes: args.http_max_body_bytes,
            log_filter: args.log_filter,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidSetting {
        name: "HALOSCAN_BASE_URL",
        value: raw.to_string(),
    };
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(url)
}

fn parse_tranches(raw: &str) -> Result<Vec<RankRange>, ConfigError> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            part.parse::<RankRange>()
                .map_err(|_| ConfigError::InvalidSetting {
                    name: "HALOSCAN_TRANCHES",
                    value: raw.to_string(),
                })
        })
        .collect()
}
