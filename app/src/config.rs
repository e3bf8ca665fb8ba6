// app/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
  Development,
  Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Text,
  Json,
}

#[derive(Clone)]
pub struct StripeConfig {
  pub secret_key: String,
  pub api_base: String,
  /// Signing secret for webhook deliveries. Without it only the presence of
  /// the `stripe-signature` header is checked.
  pub webhook_secret: Option<String>,
  pub webhook_tolerance_secs: u64,
  pub timeout_secs: u64,
}

// Secrets stay out of logs.
impl fmt::Debug for StripeConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StripeConfig")
      .field("secret_key", &"[REDACTED]")
      .field("api_base", &self.api_base)
      .field("webhook_secret_set", &self.webhook_secret.is_some())
      .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
      .field("timeout_secs", &self.timeout_secs)
      .finish()
  }
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub app_env: AppEnv,
  /// Origin allowed to call the webhook endpoint outside development.
  pub allowed_origin: Option<String>,

  pub database_url: String,
  pub database_service_key: String,
  pub database_max_connections: u32,
  pub run_migrations: bool,

  pub stripe: StripeConfig,
  pub default_currency: String,
  pub log_format: LogFormat,
}

impl fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("app_env", &self.app_env)
      .field("allowed_origin", &self.allowed_origin)
      .field("database_url", &"[REDACTED]")
      .field("database_max_connections", &self.database_max_connections)
      .field("run_migrations", &self.run_migrations)
      .field("stripe", &self.stripe)
      .field("default_currency", &self.default_currency)
      .field("log_format", &self.log_format)
      .finish()
  }
}

impl AppConfig {
  /// Loads `.env` (if present) and then reads the process environment.
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the configuration from an arbitrary variable source. Missing
  /// credentials are fatal here so a misconfigured process never starts
  /// serving requests.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| {
      lookup(var_name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };
    let get_or = |var_name: &str, default: &str| lookup(var_name).unwrap_or_else(|| default.to_string());

    let server_host = get_or("SERVER_HOST", "127.0.0.1");
    let server_port = parse_var("SERVER_PORT", &get_or("SERVER_PORT", "8080"))?;

    let app_env = match get_or("APP_ENV", "development").to_ascii_lowercase().as_str() {
      "development" | "dev" | "local" => AppEnv::Development,
      "production" | "prod" => AppEnv::Production,
      other => return Err(AppError::Config(format!("Invalid APP_ENV: {}", other))),
    };
    let allowed_origin = get_env("ALLOWED_ORIGIN").ok();
    if app_env == AppEnv::Production && allowed_origin.is_none() {
      return Err(AppError::Config(
        "ALLOWED_ORIGIN must be set when APP_ENV=production".to_string(),
      ));
    }

    let database_url = get_env("DATABASE_URL")?;
    let database_service_key = get_env("DATABASE_SERVICE_KEY")?;
    let database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", &get_or("DATABASE_MAX_CONNECTIONS", "5"))?;
    let run_migrations = parse_var("RUN_MIGRATIONS", &get_or("RUN_MIGRATIONS", "true"))?;

    let stripe = StripeConfig {
      secret_key: get_env("STRIPE_SECRET_KEY")?,
      api_base: get_or("STRIPE_API_BASE", "https://api.stripe.com")
        .trim_end_matches('/')
        .to_string(),
      webhook_secret: get_env("STRIPE_WEBHOOK_SECRET").ok(),
      webhook_tolerance_secs: parse_var(
        "STRIPE_WEBHOOK_TOLERANCE_SECS",
        &get_or("STRIPE_WEBHOOK_TOLERANCE_SECS", "300"),
      )?,
      timeout_secs: parse_var("STRIPE_TIMEOUT_SECS", &get_or("STRIPE_TIMEOUT_SECS", "30"))?,
    };

    let default_currency = get_or("DEFAULT_CURRENCY", "usd").trim().to_ascii_lowercase();
    if default_currency.len() != 3 || !default_currency.bytes().all(|b| b.is_ascii_lowercase()) {
      return Err(AppError::Config(format!(
        "DEFAULT_CURRENCY must be a three-letter ISO code, got '{}'",
        default_currency
      )));
    }
    let log_format = match get_or("LOG_FORMAT", "text").to_ascii_lowercase().as_str() {
      "json" => LogFormat::Json,
      _ => LogFormat::Text,
    };

    Ok(Self {
      server_host,
      server_port,
      app_env,
      allowed_origin,
      database_url,
      database_service_key,
      database_max_connections,
      run_migrations,
      stripe,
      default_currency,
      log_format,
    })
  }

  /// `Access-Control-Allow-Origin` value for the webhook endpoint.
  pub fn webhook_cors_origin(&self) -> &str {
    match (self.app_env, self.allowed_origin.as_deref()) {
      (AppEnv::Production, Some(origin)) => origin,
      _ => "*",
    }
  }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
  T: std::str::FromStr,
  T::Err: fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e)))
}
