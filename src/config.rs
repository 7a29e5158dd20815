use crate::error::{AppError, Result};

pub const MARKET_DATA_URL: &str = "https://query2.finance.yahoo.com";

/// Shares controlled by one listed equity option contract.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// Scales dollar gamma to a 1% move in the underlying.
pub const ONE_PERCENT_MOVE: f64 = 0.01;

/// Calendar days per year used when converting days-to-expiry to a year fraction.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Percentile reported when no history exists or history cannot be read.
pub const NEUTRAL_PERCENTILE: u8 = 50;

/// Strikes within this fraction of spot are dumped at debug level per ticker.
pub const DEBUG_STRIKE_BAND: f64 = 0.05;

/// Regular session close, local wall-clock hour.
pub const MARKET_CLOSE_HOUR: u32 = 16;

/// Browser user agent; the market data host rejects default client agents.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    pub market_data_url: String,
    pub http_timeout_secs: u64,
    /// Risk-free rate fed to the gamma model (RISK_FREE_RATE)
    pub risk_free_rate: f64,
    /// Nearest expirations processed per ticker (MAX_EXPIRATIONS)
    pub max_expirations: usize,
    /// Persisted strike records are limited to spot ± this fraction (STRIKE_WINDOW_PCT)
    pub strike_window_pct: f64,
    /// Tickers inserted into the watchlist on startup if absent (WATCHLIST, comma-separated).
    pub watchlist_seed: Vec<String>,
    /// Scheduled job refuses to run while the market is open (REQUIRE_MARKET_CLOSED)
    pub require_market_closed: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "gex.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            market_data_url: std::env::var("MARKET_DATA_URL")
                .unwrap_or_else(|_| MARKET_DATA_URL.to_string()),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .unwrap_or(30),
            risk_free_rate: std::env::var("RISK_FREE_RATE")
                .unwrap_or_else(|_| "0.04".to_string())
                .parse::<f64>()
                .map_err(|_| AppError::Config("RISK_FREE_RATE must be a number".to_string()))?,
            max_expirations: std::env::var("MAX_EXPIRATIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<usize>()
                .unwrap_or(10),
            strike_window_pct: std::env::var("STRIKE_WINDOW_PCT")
                .unwrap_or_else(|_| "0.15".to_string())
                .parse::<f64>()
                .map_err(|_| AppError::Config("STRIKE_WINDOW_PCT must be a number".to_string()))?,
            watchlist_seed: parse_ticker_list(&std::env::var("WATCHLIST").unwrap_or_default()),
            require_market_closed: std::env::var("REQUIRE_MARKET_CLOSED")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

/// `" spy, qqq ,,IWM"` → `["SPY", "QQQ", "IWM"]`
pub fn parse_ticker_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
