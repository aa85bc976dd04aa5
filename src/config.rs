use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub top_posts: TopPostsConfig,
    #[serde(default)]
    pub cookie: CookieConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL the browser script is served from (e.g. "https://recirc.example.org").
    #[serde(default)]
    pub public_url: String,
    /// Origin of the news site when this service runs on another host. The
    /// visit beacon is then allowed cross-origin with credentials.
    #[serde(default)]
    pub site_origin: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    4
}

/// Scheduled analytics refresh.
#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_enabled")]
    pub enabled: bool,
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            request_timeout_secs: 30,
            page_limit: 100,
        }
    }
}

fn default_refresh_enabled() -> bool {
    true
}
fn default_refresh_interval() -> u64 {
    3600
}
fn default_request_timeout() -> u64 {
    30
}
fn default_page_limit() -> u32 {
    100
}

/// Ranking and rendering of the top posts block.
#[derive(Debug, Deserialize, Clone)]
pub struct TopPostsConfig {
    #[serde(default = "default_sections")]
    pub sections: Vec<String>,
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
    #[serde(default = "default_min_display")]
    pub min_display: usize,
    #[serde(default)]
    pub excluded_categories: Vec<String>,
    #[serde(default = "default_utm_source")]
    pub utm_source: String,
}

impl Default for TopPostsConfig {
    fn default() -> Self {
        Self {
            sections: default_sections(),
            max_articles: 25,
            min_display: 5,
            excluded_categories: Vec::new(),
            utm_source: default_utm_source(),
        }
    }
}

fn default_sections() -> Vec<String> {
    vec!["/news/".to_string(), "/background/".to_string()]
}
fn default_max_articles() -> usize {
    25
}
fn default_min_display() -> usize {
    5
}
fn default_utm_source() -> String {
    "recirculatie".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CookieConfig {
    #[serde(default = "default_cookie_expiry_days")]
    pub expiry_days: u32,
    /// Mark the visit cookie `Secure`. Leave on unless serving plain HTTP locally.
    #[serde(default = "default_cookie_secure")]
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            expiry_days: 7,
            secure: true,
        }
    }
}

fn default_cookie_expiry_days() -> u32 {
    7
}
fn default_cookie_secure() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    pub token: String,
}

impl AppConfig {
    /// Validate configuration before the server starts.
    pub fn validate(&self) -> Result<(), String> {
        if self.admin.token.is_empty() || self.admin.token == "change-me-in-production" {
            return Err("admin.token must be set to a strong, unique value. \
                 Set it in config.toml or via RECIRC__ADMIN__TOKEN env var."
                .to_string());
        }
        if self.admin.token.len() < 32 {
            return Err("admin.token must be at least 32 characters.".to_string());
        }
        if self.refresh.interval_secs == 0 {
            return Err("refresh.interval_secs must be greater than zero".to_string());
        }
        if self.top_posts.min_display == 0
            || self.top_posts.min_display > self.top_posts.max_articles
        {
            return Err(format!(
                "top_posts.min_display must be between 1 and max_articles ({})",
                self.top_posts.max_articles
            ));
        }
        if let Some(origin) = &self.server.site_origin {
            if url::Url::parse(origin).is_err() {
                return Err(format!("server.site_origin is not a valid origin: {origin}"));
            }
        }
        if self.top_posts.sections.iter().any(|s| !s.starts_with('/')) {
            return Err("top_posts.sections entries must start with '/'".to_string());
        }
        Ok(())
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        let path = config_path.unwrap_or("config.toml");
        builder = builder.add_source(File::with_name(path).required(false));

        // Overlay with environment variables (RECIRC__SERVER__PORT=3001, etc.)
        builder = builder.add_source(
            Environment::with_prefix("RECIRC")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
