use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Path to the JSON store document.
    pub store_path: PathBuf,
    /// Combined-score cutoff for marking attendance.
    pub accept_threshold: f32,
    /// Combined-score cutoff suggested to login-verification callers.
    pub login_threshold: f32,
    /// Timeout in seconds for one scoring request (covers image decode).
    pub verify_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let store_path = std::env::var("ROLLCALL_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("rollcall.json"));

        Self {
            store_path,
            accept_threshold: env_f32("ROLLCALL_ACCEPT_THRESHOLD", 0.30),
            login_threshold: env_f32("ROLLCALL_LOGIN_THRESHOLD", 0.35),
            verify_timeout_secs: env_u64("ROLLCALL_VERIFY_TIMEOUT_SECS", 10),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
