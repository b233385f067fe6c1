use anyhow::{ensure, Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Upper bound of the Postgres connection pool.
    pub db_max_connections: u32,
    /// Default number of most recent readings per sensor averaged when
    /// scoring a room. Overridable per request with `?limit=`.
    pub measurement_window: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let measurement_window = optional("MEASUREMENT_WINDOW", "1")
            .parse()
            .context("MEASUREMENT_WINDOW must be a positive integer")?;
        ensure!(measurement_window >= 1, "MEASUREMENT_WINDOW must be at least 1");

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            db_max_connections: optional("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            measurement_window,
        })
    }

    /// `DATABASE_URL` with the password replaced by `****`, for logging.
    pub fn masked_database_url(&self) -> String {
        mask_password(&self.database_url)
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn mask_password(url: &str) -> String {
    let Some(at) = url.rfind('@') else {
        return url.to_owned();
    };
    let Some(scheme_end) = url.find("://") else {
        return url.to_owned();
    };
    match url[scheme_end + 3..at].find(':') {
        Some(colon) => {
            let colon = scheme_end + 3 + colon;
            format!("{}:****{}", &url[..colon], &url[at..])
        }
        None => url.to_owned(),
    }
}
