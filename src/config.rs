//! Service configuration, loaded from the environment (and `.env` via dotenvy).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL. Unset runs the in-memory store.
    pub database_url: Option<String>,
    pub port: u16,
    pub db_max_connections: u32,
    pub nats_url: Option<String>,
    pub jwt_secret: String,
    pub access_token_ttl_mins: i64,
    pub zarinpal_merchant_id: String,
    pub zarinpal_sandbox: bool,
    /// Public root of this service, used to build the gateway callback URL.
    pub public_base_url: String,
    pub request_timeout: Duration,
    pub gateway_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env_parse("PORT", 8083)?;
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be set and at least 32 characters long");
        }
        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            port,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10)?,
            nats_url: non_empty("NATS_URL"),
            jwt_secret,
            access_token_ttl_mins: env_parse("ACCESS_TOKEN_TTL_MINS", 15)?,
            zarinpal_merchant_id: std::env::var("ZARINPAL_MERCHANT_ID")
                .map_err(|_| anyhow::anyhow!("ZARINPAL_MERCHANT_ID must be set"))?,
            zarinpal_sandbox: env_parse("ZARINPAL_SANDBOX", false)?,
            public_base_url: non_empty("PUBLIC_BASE_URL").unwrap_or_else(|| format!("http://localhost:{port}")),
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECS", 30)?),
            gateway_timeout: Duration::from_secs(env_parse("GATEWAY_TIMEOUT_SECS", 15)?),
        })
    }

    pub fn callback_url(&self) -> String {
        format!("{}/payment/zarinpal/check", self.public_base_url.trim_end_matches('/'))
    }
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match non_empty(name) {
        Some(raw) => raw.trim().parse().map_err(|e| anyhow::anyhow!("{name}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_url_strips_trailing_slash() {
        let config = Config {
            database_url: None, port: 8083, db_max_connections: 10, nats_url: None,
            jwt_secret: "x".repeat(32), access_token_ttl_mins: 15, zarinpal_merchant_id: "m".into(), zarinpal_sandbox: true,
            public_base_url: "https://books.example/".into(),
            request_timeout: Duration::from_secs(30), gateway_timeout: Duration::from_secs(15),
        };
        assert_eq!(config.callback_url(), "https://books.example/payment/zarinpal/check");
    }
}
