// gok_checkout/src/models/bank_config.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Receiving account offered for bank-transfer payments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BankTransferConfig {
  pub id: Uuid,
  pub bank_code: String,
  pub bank_name: String,
  pub account_number: String,
  pub account_name: String,
  pub is_active: bool,
  pub display_order: i32,
  pub is_deleted: bool,
  pub version: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBankConfig {
  pub bank_code: String,
  pub bank_name: String,
  pub account_number: String,
  pub account_name: String,
  #[serde(default = "default_true")]
  pub is_active: bool,
  #[serde(default)]
  pub display_order: i32,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankConfigUpdate {
  pub bank_name: Option<String>,
  pub account_number: Option<String>,
  pub account_name: Option<String>,
  pub is_active: Option<bool>,
  pub display_order: Option<i32>,
}

fn default_true() -> bool {
  true
}
