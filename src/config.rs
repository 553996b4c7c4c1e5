use anyhow::{anyhow, Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub stripe: StripeConfig,
    pub mercado_pago: MercadoPagoConfig,
    pub redis: RedisConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub api_base: String,
    pub timeout: Duration,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    pub access_token: String,
    pub public_key: String,
    pub api_base: String,
    pub timeout: Duration,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RedisConfig {
    /// When set, webhook overrides are kept in Redis instead of process memory
    pub url: Option<String>,
}

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_MERCADO_PAGO_API_BASE: &str = "https://api.mercadopago.com";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        let timeout = Duration::from_secs(
            env::var("UPSTREAM_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_UPSTREAM_TIMEOUT_SECS.to_string())
                .parse()
                .context("UPSTREAM_TIMEOUT_SECS must be a valid number")?,
        );

        let stripe = StripeConfig {
            secret_key: env::var("STRIPE_SECRET_KEY").context(
                "STRIPE_SECRET_KEY is not configured. Please set the STRIPE_SECRET_KEY environment variable",
            )?,
            api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string()),
            timeout,
            webhook_secret: optional_var("STRIPE_WEBHOOK_SECRET"),
        };

        let mercado_pago = MercadoPagoConfig {
            access_token: env::var("MERCADO_PAGO_ACCESS_TOKEN").context(
                "MERCADO_PAGO_ACCESS_TOKEN is not configured. Please set the MERCADO_PAGO_ACCESS_TOKEN environment variable",
            )?,
            public_key: env::var("MERCADO_PAGO_PUBLIC_KEY")
                .context("MERCADO_PAGO_PUBLIC_KEY not set")?,
            api_base: env::var("MERCADO_PAGO_API_BASE")
                .unwrap_or_else(|_| DEFAULT_MERCADO_PAGO_API_BASE.to_string()),
            timeout,
            webhook_secret: optional_var("MERCADO_PAGO_WEBHOOK_SECRET"),
        };

        let redis = RedisConfig {
            url: optional_var("REDIS_URL"),
        };

        let config = Config {
            server,
            stripe,
            mercado_pago,
            redis,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("PORT must be greater than 0"));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        // Secrets must carry a value, not just be present
        if self.stripe.secret_key.trim().is_empty() {
            return Err(anyhow!("STRIPE_SECRET_KEY cannot be empty"));
        }

        if self.mercado_pago.access_token.trim().is_empty() {
            return Err(anyhow!("MERCADO_PAGO_ACCESS_TOKEN cannot be empty"));
        }

        if self.mercado_pago.public_key.trim().is_empty() {
            return Err(anyhow!("MERCADO_PAGO_PUBLIC_KEY cannot be empty"));
        }

        if self.stripe.api_base.trim().is_empty() || self.mercado_pago.api_base.trim().is_empty() {
            return Err(anyhow!("Processor API base URLs cannot be empty"));
        }

        if self.stripe.timeout.is_zero() {
            return Err(anyhow!("UPSTREAM_TIMEOUT_SECS must be greater than 0"));
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
