//! Payment types and data structures
//!
//! Requests accepted from clients, the processor records the adapters
//! return, and the response shapes the orchestration service produces.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// Currency used for every payment intent
pub const DEFAULT_CURRENCY: &str = "brl";

/// Smallest accepted amount, in major units
pub const MIN_AMOUNT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest accepted amount, in major units
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);

/// Statement descriptors longer than this are rejected by the card processor
pub const STATEMENT_DESCRIPTOR_MAX: usize = 22;

/// Card brand used when the client does not name one
pub const DEFAULT_CARD_BRAND: &str = "visa";

/// Payment method requested for a payment intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Card,
    Pix,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Pix => "pix",
        }
    }
}

/// Reject amounts outside [`MIN_AMOUNT`]..=[`MAX_AMOUNT`]
pub fn validate_amount(amount: Decimal) -> Result<Decimal, ValidationError> {
    if amount < MIN_AMOUNT {
        return Err(ValidationError::NonPositiveAmount {
            field: "amount".to_string(),
        });
    }
    if amount > MAX_AMOUNT {
        return Err(ValidationError::InvalidField {
            field: "amount".to_string(),
            reason: format!("must not exceed {}", MAX_AMOUNT),
        });
    }
    Ok(amount)
}

/// Convert a major-unit amount (49.90) to minor units (4990), rounding half
/// away from zero like the processors do
pub fn to_minor_units(amount: Decimal) -> Result<i64, ValidationError> {
    let too_large = || ValidationError::InvalidField {
        field: "amount".to_string(),
        reason: "is too large".to_string(),
    };
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(too_large)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(too_large)
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .expect("email pattern is valid")
    })
}

fn non_digit_regex() -> &'static Regex {
    static NON_DIGIT: OnceLock<Regex> = OnceLock::new();
    NON_DIGIT.get_or_init(|| Regex::new(r"\D").expect("non-digit pattern is valid"))
}

pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::MissingField {
            field: "email".to_string(),
        });
    }
    if !email_regex().is_match(email) {
        return Err(ValidationError::InvalidEmail {
            field: "email".to_string(),
        });
    }
    Ok(email.to_string())
}

pub fn require_non_empty(field: &str, value: &str) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(value.to_string())
}

/// Keep only the digits of a CPF/CNPJ style document number
pub fn digits_only(value: &str) -> String {
    non_digit_regex().replace_all(value, "").into_owned()
}

/// First [`STATEMENT_DESCRIPTOR_MAX`] characters of a description
pub fn statement_descriptor(description: &str) -> String {
    description.chars().take(STATEMENT_DESCRIPTOR_MAX).collect()
}

/// Identifier that processors send either as a JSON number or a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
    Number(u64),
    Text(String),
}

impl ExternalId {
    /// String form; `None` for blank text ids
    pub fn into_string(self) -> Option<String> {
        match self {
            ExternalId::Number(n) => Some(n.to_string()),
            ExternalId::Text(s) if s.trim().is_empty() => None,
            ExternalId::Text(s) => Some(s),
        }
    }
}

/// Intent creation request sent to the intent processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    /// Amount in minor units (centavos)
    pub amount_minor: i64,
    pub currency: String,
    pub method: PaymentMethod,
}

/// Processor-side payment intent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in minor units
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub payment_method: Option<Value>,
    #[serde(default)]
    pub payment_method_types: Vec<String>,
    #[serde(default)]
    pub last_payment_error: Option<Value>,
    #[serde(default)]
    pub next_action: Option<NextAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextAction {
    #[serde(default, rename = "type")]
    pub action_type: Option<String>,
    #[serde(default)]
    pub pix_display_qr_code: Option<PixDisplayQrCode>,
    #[serde(default)]
    pub display_bank_transfer_instructions: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PixDisplayQrCode {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub image_url_png: Option<String>,
    #[serde(default)]
    pub image_url_svg: Option<String>,
    #[serde(default)]
    pub hosted_instructions_url: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

/// Where the PIX payload of an intent was found
#[derive(Debug, Clone, PartialEq)]
pub enum PixInstructions {
    QrCode(PixDisplayQrCode),
    BankTransfer { qr_code: Option<String>, raw: Value },
}

impl PixInstructions {
    /// The copy-and-paste PIX code, if the processor provided one
    pub fn qr_code(&self) -> Option<&str> {
        match self {
            PixInstructions::QrCode(qr) => qr.data.as_deref(),
            PixInstructions::BankTransfer { qr_code, .. } => qr_code.as_deref(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            PixInstructions::QrCode(qr) => serde_json::to_value(qr).unwrap_or(Value::Null),
            PixInstructions::BankTransfer { raw, .. } => raw.clone(),
        }
    }
}

impl PaymentIntent {
    pub fn is_pix(&self) -> bool {
        self.payment_method_types.iter().any(|t| t == "pix")
    }

    /// Extract PIX display data from `next_action`, preferring the dedicated
    /// QR block over bank transfer instructions
    pub fn pix_instructions(&self) -> Option<PixInstructions> {
        let action = self.next_action.as_ref()?;
        if let Some(qr) = &action.pix_display_qr_code {
            return Some(PixInstructions::QrCode(qr.clone()));
        }
        action
            .display_bank_transfer_instructions
            .as_ref()
            .map(|raw| PixInstructions::BankTransfer {
                qr_code: raw.get("qr_code").and_then(Value::as_str).map(str::to_string),
                raw: raw.clone(),
            })
    }

    /// Payment method id whether the processor returned it expanded or not
    pub fn payment_method_id(&self) -> Option<String> {
        match self.payment_method.as_ref()? {
            Value::String(id) => Some(id.clone()),
            Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerIdentification {
    #[serde(rename = "type")]
    pub id_type: String,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDetails {
    pub token: String,
    pub installments: u32,
    pub payment_method_id: String,
    pub issuer_id: Option<i64>,
    pub identification: Option<PayerIdentification>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectMethod {
    Pix,
    Card(CardDetails),
}

/// Validated payment request for the direct-payment processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectPaymentRequest {
    pub amount: Decimal,
    pub email: String,
    pub description: String,
    pub method: DirectMethod,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PixQrCode {
    pub qr_code: Option<String>,
    pub qr_code_base64: Option<String>,
    pub ticket_url: Option<String>,
}

impl PixQrCode {
    pub fn is_empty(&self) -> bool {
        self.qr_code.as_deref().unwrap_or_default().is_empty()
            && self.qr_code_base64.as_deref().unwrap_or_default().is_empty()
    }
}

/// Payment record as returned by the direct-payment processor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorPayment {
    pub id: String,
    pub status: String,
    pub status_detail: Option<String>,
    pub transaction_amount: Option<Decimal>,
    pub installments: Option<u32>,
    pub payment_method_id: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_approved: Option<DateTime<Utc>>,
    pub pix: Option<PixQrCode>,
    /// Diagnostic causes attached to a rejection
    pub causes: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    #[serde(default)]
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePixPaymentRequest {
    pub amount: Decimal,
    pub email: String,
    pub description: String,
}

impl CreatePixPaymentRequest {
    pub fn validate(self) -> Result<DirectPaymentRequest, ValidationError> {
        Ok(DirectPaymentRequest {
            amount: validate_amount(self.amount)?,
            email: validate_email(&self.email)?,
            description: require_non_empty("description", &self.description)?,
            method: DirectMethod::Pix,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCardPaymentRequest {
    pub amount: Decimal,
    pub email: String,
    pub description: String,
    pub token: String,
    #[serde(default)]
    pub installments: Option<u32>,
    #[serde(default)]
    pub payment_method_id: Option<String>,
    #[serde(default)]
    pub issuer_id: Option<String>,
    #[serde(default)]
    pub payer_identification_type: Option<String>,
    #[serde(default)]
    pub payer_identification_number: Option<String>,
}

impl CreateCardPaymentRequest {
    pub fn validate(self) -> Result<DirectPaymentRequest, ValidationError> {
        let amount = validate_amount(self.amount)?;
        let email = validate_email(&self.email)?;
        let description = require_non_empty("description", &self.description)?;
        let token = require_non_empty("token", &self.token)?;

        let installments = self.installments.unwrap_or(1);
        if installments < 1 {
            return Err(ValidationError::InvalidField {
                field: "installments".to_string(),
                reason: "must not be less than 1".to_string(),
            });
        }

        let payment_method_id = match self.payment_method_id {
            Some(brand) => {
                let len = brand.chars().count();
                if !(3..=10).contains(&len) {
                    return Err(ValidationError::InvalidField {
                        field: "payment_method_id".to_string(),
                        reason: "must be between 3 and 10 characters".to_string(),
                    });
                }
                brand
            }
            None => DEFAULT_CARD_BRAND.to_string(),
        };

        let issuer_id = match self.issuer_id.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                Some(raw.parse::<i64>().map_err(|_| ValidationError::InvalidField {
                    field: "issuer_id".to_string(),
                    reason: "must be numeric".to_string(),
                })?)
            }
            _ => None,
        };

        // Identification is only meaningful with both halves present
        let identification = match (
            self.payer_identification_type,
            self.payer_identification_number,
        ) {
            (Some(id_type), Some(number)) if !id_type.is_empty() && !number.is_empty() => {
                Some(PayerIdentification {
                    id_type,
                    number: digits_only(&number),
                })
            }
            _ => None,
        };

        Ok(DirectPaymentRequest {
            amount,
            email,
            description,
            method: DirectMethod::Card(CardDetails {
                token,
                installments,
                payment_method_id,
                issuer_id,
                identification,
            }),
        })
    }
}

/// Intent as shown to clients after create/confirm/cancel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_instructions: Option<Value>,
}

/// Intent status as shown to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentStatusView {
    pub id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub client_secret: Option<String>,
    pub payment_method: Option<String>,
    pub last_payment_error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_instructions: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixPaymentView {
    pub payment_id: String,
    pub status: String,
    pub qr_code: String,
    pub qr_code_base64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardPaymentView {
    pub payment_id: String,
    pub status: String,
    pub status_detail: String,
    pub transaction_amount: Decimal,
    pub installments: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
}

/// Direct payment status after the override rule has been applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentStatusView {
    pub id: String,
    pub status: String,
    pub transaction_amount: Option<Decimal>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_approved: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfigView {
    pub public_key: String,
}
