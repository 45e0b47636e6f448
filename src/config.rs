use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_RATE_LIMIT_PER_SECOND: u64 = 10;
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Request body limit; bounds CSV uploads.
    pub max_upload_bytes: usize,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    /// Apply the embedded migrations at startup.
    pub run_migrations: bool,
}

/// Parses an optional numeric variable, falling back to `default` when unset.
fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    default: T,
    err: &str,
) -> anyhow::Result<T> {
    match value.filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| anyhow::anyhow!("{}", err)),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database: {}", config.database_target());
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .or_else(|| lookup("DB_URL"))
                .ok_or_else(|| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: parse_or(
                lookup("PORT"),
                DEFAULT_PORT,
                "PORT must be a valid number between 1-65535",
            )?,
            db_max_connections: parse_or(
                lookup("DB_MAX_CONNECTIONS"),
                DEFAULT_DB_MAX_CONNECTIONS,
                "DB_MAX_CONNECTIONS must be a positive number",
            )
            .and_then(|n| {
                if n == 0 {
                    anyhow::bail!("DB_MAX_CONNECTIONS must be a positive number");
                }
                Ok(n)
            })?,
            max_upload_bytes: parse_or(
                lookup("MAX_UPLOAD_BYTES"),
                DEFAULT_MAX_UPLOAD_BYTES,
                "MAX_UPLOAD_BYTES must be a number of bytes",
            )?,
            rate_limit_per_second: parse_or(
                lookup("RATE_LIMIT_PER_SECOND"),
                DEFAULT_RATE_LIMIT_PER_SECOND,
                "RATE_LIMIT_PER_SECOND must be a positive number",
            )
            .and_then(|n| {
                if n == 0 {
                    anyhow::bail!("RATE_LIMIT_PER_SECOND must be a positive number");
                }
                Ok(n)
            })?,
            rate_limit_burst: parse_or(
                lookup("RATE_LIMIT_BURST"),
                DEFAULT_RATE_LIMIT_BURST,
                "RATE_LIMIT_BURST must be a positive number",
            )
            .and_then(|n| {
                if n == 0 {
                    anyhow::bail!("RATE_LIMIT_BURST must be a positive number");
                }
                Ok(n)
            })?,
            run_migrations: match lookup("RUN_MIGRATIONS")
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty())
                .as_deref()
            {
                None | Some("true") | Some("1") | Some("yes") => true,
                Some("false") | Some("0") | Some("no") => false,
                Some(other) => anyhow::bail!("RUN_MIGRATIONS must be true or false, got {}", other),
            },
        })
    }

    /// Scheme and host of the database URL, safe to log.
    pub fn database_target(&self) -> String {
        match url::Url::parse(&self.database_url) {
            Ok(parsed) => format!(
                "{}://{}",
                parsed.scheme(),
                parsed.host_str().unwrap_or("localhost")
            ),
            Err(_) => "<unparsable url>".to_string(),
        }
    }

    /// Configuration for tests that never touch a database.
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/wholesale_crm_test".to_string(),
            port: DEFAULT_PORT,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            rate_limit_per_second: DEFAULT_RATE_LIMIT_PER_SECOND,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
            run_migrations: false,
        }
    }
}
