use std::env;
use std::path::PathBuf;

const DEFAULT_ENDPOINT: &str = "https://api.smartloop.ai/v1";
const DEFAULT_AUTH_SERVER: &str = "http://localhost:3000";
const DEFAULT_CLIENT_ID: &str = "smartloop-cli";
const DEFAULT_CALLBACK_PORT: u16 = 5000;
const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 120;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROFILE_DIR: &str = ".smartloop";
const DEFAULT_PROFILE_FILE: &str = "config.yaml";

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub auth_server: String,
    pub client_id: String,
    pub callback_port: u16,
    pub login_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub profile_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        Self {
            endpoint: parse_url(get_var("SLP_ENDPOINT").as_deref(), DEFAULT_ENDPOINT),
            auth_server: parse_url(get_var("SLP_AUTH_SERVER").as_deref(), DEFAULT_AUTH_SERVER),
            client_id: parse_client_id(get_var("SLP_CLIENT_ID").as_deref()),
            callback_port: parse_callback_port(get_var("SLP_CALLBACK_PORT").as_deref()),
            login_timeout_secs: parse_positive_u64(
                get_var("SLP_LOGIN_TIMEOUT_SECS").as_deref(),
                DEFAULT_LOGIN_TIMEOUT_SECS,
            ),
            http_timeout_secs: parse_positive_u64(
                get_var("SLP_HTTP_TIMEOUT_SECS").as_deref(),
                DEFAULT_HTTP_TIMEOUT_SECS,
            ),
            profile_path: parse_profile_path(get_var("SLP_PROFILE_PATH").as_deref()),
        }
    }

    /// Hostname of the API endpoint; the profile store is keyed by it.
    pub fn endpoint_host(&self) -> String {
        reqwest::Url::parse(&self.endpoint)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.endpoint.clone())
    }
}

fn parse_positive_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_callback_port(raw: Option<&str>) -> u16 {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_CALLBACK_PORT)
}

fn parse_url(raw: Option<&str>, default: &str) -> String {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

fn parse_client_id(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CLIENT_ID)
        .to_string()
}

fn parse_profile_path(raw: Option<&str>) -> PathBuf {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_profile_path)
}

fn default_profile_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_PROFILE_DIR)
        .join(DEFAULT_PROFILE_FILE)
}
