use serde::Deserialize;

/// Main configuration structure for Search-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Remote search endpoint and crawl pacing
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Root URL of the remote API (e.g., "https://api.twitter.com/1.1")
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Opaque credential sent as a bearer token
    #[serde(rename = "bearer-token")]
    pub bearer_token: String,

    /// Query string every request starts from, including its `count` parameter
    #[serde(rename = "base-query")]
    pub base_query: String,

    /// Newest id already harvested; 0 means start from the newest page
    #[serde(rename = "most-recent-id", default)]
    pub most_recent_id: u64,

    /// Pause between requests and between retries (seconds)
    #[serde(rename = "sleep-interval", default = "default_sleep_interval")]
    pub sleep_interval: u64,

    /// Pause once the crawl has caught up (seconds)
    #[serde(rename = "idle-interval", default = "default_idle_interval")]
    pub idle_interval: u64,
}

/// Data log and rotation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the active CSV log
    #[serde(rename = "data-file")]
    pub data_file: String,

    /// Directory receiving the monthly archives
    #[serde(rename = "data-dir", default = "default_data_dir")]
    pub data_dir: String,

    /// Whether the active log is rotated at month boundaries
    #[serde(rename = "rotation-enabled", default = "default_true")]
    pub rotation_enabled: bool,

    /// Month the active log currently holds ("YYYY-MM"); defaults to now
    #[serde(rename = "current-month", default)]
    pub current_month: Option<String>,

    /// Offset of the zone used for timestamps and month boundaries
    #[serde(rename = "utc-offset-hours", default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// Optional JSON file the cursor and active month are saved to
    #[serde(rename = "checkpoint-path", default)]
    pub checkpoint_path: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub filename: Option<String>,
}

fn default_sleep_interval() -> u64 {
    5
}

fn default_idle_interval() -> u64 {
    60 * 60 * 12
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_true() -> bool {
    true
}

fn default_utc_offset_hours() -> i32 {
    9
}
