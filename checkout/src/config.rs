// gok_checkout/src/config.rs

use crate::errors::{AppError, Result};
use chrono::Duration;
use dotenvy::dotenv;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
  /// Postgres connection string; the in-memory store is used when unset.
  pub database_url: Option<String>,

  pub tax_rate: Decimal,
  pub shipping_fee: Decimal,
  pub payment_expiry_minutes: i64,
  pub payment_description_prefix: String,

  pub qr_image_base_url: String,
  pub qr_template: String,

  pub cache_ttl_seconds: u64,

  // Optional: for seeding the store on startup
  pub seed_db: bool,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    let config = Self::from_lookup(|name| env::var(name).ok())?;
    tracing::info!(
      persistent = config.database_url.is_some(),
      "Application configuration loaded successfully."
    );
    Ok(config)
  }

  /// Builds the config from any variable source; missing variables fall back to defaults.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

    let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

    let tax_rate = parse_var::<Decimal>("TAX_RATE", &get_or("TAX_RATE", "0.10"))?;
    if tax_rate < Decimal::ZERO || tax_rate >= Decimal::ONE {
      return Err(AppError::Config(format!("TAX_RATE must be in [0, 1): {}", tax_rate)));
    }
    let shipping_fee = parse_var::<Decimal>("SHIPPING_FEE", &get_or("SHIPPING_FEE", "30000"))?;
    if shipping_fee < Decimal::ZERO {
      return Err(AppError::Config(format!("SHIPPING_FEE must not be negative: {}", shipping_fee)));
    }
    let payment_expiry_minutes = parse_var::<i64>("PAYMENT_EXPIRY_MINUTES", &get_or("PAYMENT_EXPIRY_MINUTES", "15"))?;
    if payment_expiry_minutes <= 0 {
      return Err(AppError::Config("PAYMENT_EXPIRY_MINUTES must be positive".to_string()));
    }

    let payment_description_prefix = get_or("PAYMENT_DESCRIPTION_PREFIX", "GOKCAFE");
    let qr_image_base_url = get_or("QR_IMAGE_BASE_URL", "https://img.vietqr.io/image");
    url::Url::parse(&qr_image_base_url)
      .map_err(|e| AppError::Config(format!("Invalid QR_IMAGE_BASE_URL '{}': {}", qr_image_base_url, e)))?;
    let qr_template = get_or("QR_TEMPLATE", "compact2");

    let cache_ttl_seconds = parse_var::<u64>("CACHE_TTL_SECONDS", &get_or("CACHE_TTL_SECONDS", "300"))?;
    let seed_db = parse_var::<bool>("SEED_DB", &get_or("SEED_DB", "false"))?;

    Ok(Self {
      database_url,
      tax_rate,
      shipping_fee,
      payment_expiry_minutes,
      payment_description_prefix,
      qr_image_base_url,
      qr_template,
      cache_ttl_seconds,
      seed_db,
    })
  }

  pub fn checkout_settings(&self) -> CheckoutSettings {
    CheckoutSettings {
      tax_rate: self.tax_rate,
      shipping_fee: self.shipping_fee,
      payment_expiry: Duration::minutes(self.payment_expiry_minutes),
      description_prefix: self.payment_description_prefix.clone(),
    }
  }

  pub fn cache_ttl(&self) -> std::time::Duration {
    std::time::Duration::from_secs(self.cache_ttl_seconds)
  }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", name, raw, e)))
}

/// Pricing and payment constants shared by the order and payment services.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSettings {
  pub tax_rate: Decimal,
  pub shipping_fee: Decimal,
  pub payment_expiry: Duration,
  pub description_prefix: String,
}

impl Default for CheckoutSettings {
  fn default() -> Self {
    Self {
      tax_rate: Decimal::new(10, 2),
      shipping_fee: Decimal::from(30_000),
      payment_expiry: Duration::minutes(15),
      description_prefix: "GOKCAFE".to_string(),
    }
  }
}
