//! Webhook envelope parsing
//!
//! Processors vary the envelope shape between event kinds. The payment
//! payload may sit under `data.object`, directly under `data`, or at the root,
//! and ids arrive as numbers or strings.

use crate::payments::types::ExternalId;
use serde::Deserialize;
use serde_json::Value;

/// Id and status as they appear in a payment payload
#[derive(Debug, Default, Clone, Deserialize)]
struct PaymentFields {
    #[serde(default)]
    id: Option<ExternalId>,
    #[serde(default)]
    status: Option<String>,
}

/// The `data` member, in either of the shapes processors use
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataField {
    Wrapped { object: PaymentFields },
    Direct(PaymentFields),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default, rename = "type")]
    event_type: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    id: Option<ExternalId>,
    #[serde(default)]
    status: Option<String>,
}

/// What the receiver extracted from a delivery
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WebhookEvent {
    pub event_type: Option<String>,
    pub payment_id: Option<String>,
    pub status: Option<String>,
}

impl WebhookEvent {
    /// Events with a type that doesn't mention payments carry no payment state
    pub fn is_payment_event(&self) -> bool {
        match self.event_type.as_deref() {
            Some(kind) => kind.to_ascii_lowercase().contains("payment"),
            None => true,
        }
    }

    /// Id and status, when both are present and non-blank
    pub fn payment_update(&self) -> Option<(&str, &str)> {
        let id = self.payment_id.as_deref()?;
        let status = self.status.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((id, status))
    }
}

/// Parse a raw delivery body; `None` when it is not a JSON object
pub fn parse_event(body: &[u8]) -> Option<WebhookEvent> {
    let raw: RawEnvelope = serde_json::from_slice(body).ok()?;

    let event_type = raw
        .event_type
        .filter(|t| !t.is_empty())
        .or_else(|| raw.action.filter(|a| !a.is_empty()));

    // payload lookup order: data.object, data, root
    let nested = raw
        .data
        .and_then(|data| serde_json::from_value::<DataField>(data).ok())
        .map(|field| match field {
            DataField::Wrapped { object } => object,
            DataField::Direct(fields) => fields,
        });

    let fields = match nested {
        Some(fields) if fields.id.is_some() || fields.status.is_some() => fields,
        _ => PaymentFields {
            id: raw.id,
            status: raw.status,
        },
    };

    Some(WebhookEvent {
        event_type,
        payment_id: fields.id.and_then(ExternalId::into_string),
        status: fields.status,
    })
}

/// `data.id` from the delivery body, used when the query string lacks it
pub fn data_id(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let id = value.get("data")?.get("id")?.clone();
    serde_json::from_value::<ExternalId>(id)
        .ok()
        .and_then(ExternalId::into_string)
}
