// gok_checkout/src/services/qr.rs

//! VietQR rendering: an EMVCo merchant-presented payload for bank-transfer
//! payments plus the matching quick-link image URL.

use crate::errors::{AppError, Result};
use rust_decimal::Decimal;
use url::Url;

/// Renders QR data for a bank transfer into a receiving account.
pub trait QrRenderer: Send + Sync {
  fn generate_qr_payload(
    &self,
    bank_code: &str,
    account_number: &str,
    account_name: &str,
    amount: Decimal,
    description: &str,
  ) -> Result<String>;

  fn generate_qr_image_url(
    &self,
    bank_code: &str,
    account_number: &str,
    account_name: &str,
    amount: Decimal,
    description: &str,
  ) -> Result<String>;
}

/// NAPAS acquirer ids for the bank short codes we accept.
const BANK_BINS: &[(&str, &str)] = &[
  ("VCB", "970436"),
  ("BIDV", "970418"),
  ("ICB", "970415"),
  ("VIETINBANK", "970415"),
  ("ACB", "970416"),
  ("TCB", "970407"),
  ("MB", "970422"),
  ("VPB", "970432"),
  ("TPB", "970423"),
  ("STB", "970403"),
  ("VBA", "970405"),
  ("SHB", "970443"),
  ("HDB", "970437"),
  ("OCB", "970448"),
  ("MSB", "970426"),
  ("VIB", "970441"),
];

const NAPAS_GUID: &str = "A000000727";
const SERVICE_TO_ACCOUNT: &str = "QRIBFTTA";
const CURRENCY_VND: &str = "704";
const COUNTRY_VN: &str = "VN";
const MAX_DESCRIPTION_LEN: usize = 50;

/// Resolves a bank short code (or a literal six-digit BIN) to its BIN.
pub fn bank_bin(bank_code: &str) -> Option<&'static str> {
  let code = bank_code.trim();
  if let Some((_, bin)) = BANK_BINS.iter().find(|(short, _)| short.eq_ignore_ascii_case(code)) {
    return Some(bin);
  }
  BANK_BINS
    .iter()
    .map(|(_, bin)| *bin)
    .find(|bin| *bin == code)
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF), as required by EMVCo tag 63.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
  let mut crc: u16 = 0xFFFF;
  for byte in data {
    crc ^= u16::from(*byte) << 8;
    for _ in 0..8 {
      crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x1021 } else { crc << 1 };
    }
  }
  crc
}

fn tlv(tag: &str, value: &str) -> Result<String> {
  if value.len() > 99 {
    return Err(AppError::Validation(format!(
      "QR field {} is too long ({} bytes)",
      tag,
      value.len()
    )));
  }
  Ok(format!("{}{:02}{}", tag, value.len(), value))
}

/// Keeps ASCII letters, digits and single spaces; banks reject anything else in transfer notes.
pub fn sanitize_description(description: &str) -> String {
  let cleaned: String = description
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
    .collect();
  let mut joined = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
  joined.truncate(MAX_DESCRIPTION_LEN);
  joined.trim_end().to_string()
}

/// VND carries no minor units.
fn format_amount(amount: Decimal) -> String {
  amount.round_dp(0).normalize().to_string()
}

#[derive(Debug, Clone)]
pub struct VietQr {
  image_base_url: String,
  template: String,
}

impl VietQr {
  pub fn new(image_base_url: impl Into<String>, template: impl Into<String>) -> Self {
    Self {
      image_base_url: image_base_url.into(),
      template: template.into(),
    }
  }

  fn require_bin(bank_code: &str) -> Result<&'static str> {
    bank_bin(bank_code).ok_or_else(|| AppError::Validation(format!("Unsupported bank code '{}'", bank_code)))
  }
}

impl Default for VietQr {
  fn default() -> Self {
    Self::new("https://img.vietqr.io/image", "compact2")
  }
}

impl QrRenderer for VietQr {
  fn generate_qr_payload(
    &self,
    bank_code: &str,
    account_number: &str,
    _account_name: &str,
    amount: Decimal,
    description: &str,
  ) -> Result<String> {
    let bin = Self::require_bin(bank_code)?;
    let account = account_number.trim();
    if account.is_empty() {
      return Err(AppError::Validation("Account number is required for a QR payload".to_string()));
    }

    let beneficiary = format!("{}{}", tlv("00", bin)?, tlv("01", account)?);
    let merchant_info = format!(
      "{}{}{}",
      tlv("00", NAPAS_GUID)?,
      tlv("01", &beneficiary)?,
      tlv("02", SERVICE_TO_ACCOUNT)?
    );

    let mut payload = String::new();
    payload.push_str(&tlv("00", "01")?);
    // Dynamic QR: the amount is bound to one transfer.
    payload.push_str(&tlv("01", "12")?);
    payload.push_str(&tlv("38", &merchant_info)?);
    payload.push_str(&tlv("53", CURRENCY_VND)?);
    if amount > Decimal::ZERO {
      payload.push_str(&tlv("54", &format_amount(amount))?);
    }
    payload.push_str(&tlv("58", COUNTRY_VN)?);
    let note = sanitize_description(description);
    if !note.is_empty() {
      payload.push_str(&tlv("62", &tlv("08", &note)?)?);
    }

    payload.push_str("6304");
    let crc = crc16_ccitt(payload.as_bytes());
    payload.push_str(&format!("{:04X}", crc));
    Ok(payload)
  }

  fn generate_qr_image_url(
    &self,
    bank_code: &str,
    account_number: &str,
    account_name: &str,
    amount: Decimal,
    description: &str,
  ) -> Result<String> {
    Self::require_bin(bank_code)?;
    let base = format!(
      "{}/{}-{}-{}.png",
      self.image_base_url.trim_end_matches('/'),
      bank_code.trim().to_uppercase(),
      account_number.trim(),
      self.template
    );
    let url = Url::parse_with_params(
      &base,
      &[
        ("amount", format_amount(amount)),
        ("addInfo", sanitize_description(description)),
        ("accountName", account_name.trim().to_string()),
      ],
    )
    .map_err(|e| AppError::Config(format!("Invalid QR image URL '{}': {}", base, e)))?;
    Ok(url.to_string())
  }
}
