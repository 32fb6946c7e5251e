use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "KonsultaLokal";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Storage keys. Names match what the browser portal wrote so existing blobs load.
pub const CONVERSATIONS_KEY: &str = "konsutal_comm_messages_v1";
pub const REFERRALS_KEY: &str = "konsutal_referrals_v1";
pub const ATTACHMENTS_KEY: &str = "konsutal_ref_files_v1";
/// Highest referral sequence issued per day.
pub const REFERRAL_SEQUENCE_KEY: &str = "konsutal_ref_seq_v1";
pub const PATIENTS_KEY: &str = "konsutal_patients_v1";

/// Simulated patient reply.
pub const DEFAULT_REPLY_DELAY_MS: u64 = 1200;
pub const DEFAULT_REPLY_TEXT: &str = "Thanks. Received.";
/// The reply is stamped slightly in the future of when it lands.
pub const REPLY_TIMESTAMP_OFFSET_MS: i64 = 2000;

const DATA_DIR_ENV: &str = "KONSULTA_DATA_DIR";
const REPLY_DELAY_ENV: &str = "KONSULTA_REPLY_DELAY_MS";

/// Get the application data directory.
/// ~/KonsultaLokal/ on all platforms, falling back to the temp dir when
/// no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Path of the durable local-storage database.
pub fn storage_path() -> PathBuf {
    app_data_dir().join("local_storage.db")
}

/// Directory that printed referrals are written to.
pub fn exports_dir() -> PathBuf {
    app_data_dir().join("exports")
}

/// Default `tracing` filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "konsulta_lib=info,warn"
}

/// Runtime configuration for one portal instance.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub data_dir: PathBuf,
    pub reply_delay: Duration,
    pub reply_text: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            data_dir: app_data_dir(),
            reply_delay: Duration::from_millis(DEFAULT_REPLY_DELAY_MS),
            reply_text: DEFAULT_REPLY_TEXT.to_string(),
        }
    }
}

impl PortalConfig {
    /// Defaults overridden by `KONSULTA_DATA_DIR` and `KONSULTA_REPLY_DELAY_MS`.
    /// Malformed overrides are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(raw) = std::env::var(REPLY_DELAY_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.reply_delay = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid {REPLY_DELAY_ENV}"),
            }
        }
        config
    }

    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join("local_storage.db")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }
}
