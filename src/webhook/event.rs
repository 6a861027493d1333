//! Payment event parsing
//!
//! Turns a provider notification into the record kept in the transactions file.

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::logger;

/// Notification document as delivered by the payment provider
#[derive(Debug, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<EventData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Deserialize)]
pub struct Transaction {
    pub id: Option<String>,
    pub reference: Option<String>,
    pub status: Option<String>,
    /// Any JSON number; the provider sends integers but older entries carry floats
    pub amount_in_cents: Option<f64>,
    pub currency: Option<String>,
    pub payment_method_type: Option<String>,
    pub created_at: Option<String>,
    /// "N/A" only when the key is absent; an explicit null stays null
    #[serde(default = "default_email")]
    pub customer_email: Option<String>,
}

fn default_email() -> Option<String> {
    Some("N/A".to_string())
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            id: None,
            reference: None,
            status: None,
            amount_in_cents: None,
            currency: None,
            payment_method_type: None,
            created_at: None,
            customer_email: default_email(),
        }
    }
}

/// One persisted entry of the transactions file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Local receive time, ISO-8601 without offset
    pub timestamp: String,
    pub event_type: Option<String>,
    pub transaction_id: Option<String>,
    pub reference: Option<String>,
    pub status: Option<String>,
    /// Major currency units
    pub amount: f64,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub created_at: Option<String>,
    pub customer_email: Option<String>,
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn into_record(self) -> TransactionRecord {
        let tx = self.data.and_then(|d| d.transaction).unwrap_or_default();
        let amount = tx.amount_in_cents.unwrap_or(0.0) / 100.0;

        TransactionRecord {
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            event_type: self.event,
            transaction_id: tx.id,
            reference: tx.reference,
            status: tx.status,
            amount,
            currency: tx.currency,
            payment_method: tx.payment_method_type,
            created_at: tx.created_at,
            customer_email: tx.customer_email,
        }
    }
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

impl TransactionRecord {
    /// Log the received event and the follow-up its status calls for
    pub fn log_received(&self) {
        logger::log_info(&format!(
            "Webhook received: {} | id={} reference={} amount={} {} status={} method={} email={}",
            or_dash(self.event_type.as_deref()),
            or_dash(self.transaction_id.as_deref()),
            or_dash(self.reference.as_deref()),
            self.amount,
            or_dash(self.currency.as_deref()),
            or_dash(self.status.as_deref()),
            or_dash(self.payment_method.as_deref()),
            or_dash(self.customer_email.as_deref()),
        ));

        match self.status.as_deref() {
            Some("APPROVED") => logger::log_info("Payment APPROVED: process order"),
            Some("DECLINED") => logger::log_info("Payment DECLINED: notify customer"),
            Some("PENDING") => logger::log_info("Payment PENDING: awaiting confirmation"),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPROVED: &str = r#"{
        "event": "transaction.updated",
        "data": {
            "transaction": {
                "id": "1234-1610641025-49201",
                "reference": "ORD-2024-0001",
                "status": "APPROVED",
                "amount_in_cents": 4490000,
                "currency": "COP",
                "payment_method_type": "NEQUI",
                "created_at": "2024-01-14T16:17:05.000Z",
                "customer_email": "cliente@example.com"
            }
        },
        "sent_at": "2024-01-14T16:17:10.000Z"
    }"#;

    #[test]
    fn test_record_fields() {
        let record = WebhookEvent::parse(APPROVED.as_bytes()).unwrap().into_record();
        assert_eq!(record.event_type.as_deref(), Some("transaction.updated"));
        assert_eq!(record.transaction_id.as_deref(), Some("1234-1610641025-49201"));
        assert_eq!(record.reference.as_deref(), Some("ORD-2024-0001"));
        assert_eq!(record.status.as_deref(), Some("APPROVED"));
        assert!((record.amount - 44_900.0).abs() < f64::EPSILON);
        assert_eq!(record.currency.as_deref(), Some("COP"));
        assert_eq!(record.payment_method.as_deref(), Some("NEQUI"));
        assert_eq!(record.customer_email.as_deref(), Some("cliente@example.com"));
        assert!(chrono::NaiveDateTime::parse_from_str(&record.timestamp, "%Y-%m-%dT%H:%M:%S%.f").is_ok());
    }

    #[test]
    fn test_missing_fields_default() {
        let record = WebhookEvent::parse(br#"{"event":"transaction.updated"}"#)
            .unwrap()
            .into_record();
        assert_eq!(record.transaction_id, None);
        assert_eq!(record.status, None);
        assert!(record.amount.abs() < f64::EPSILON);
        assert_eq!(record.customer_email.as_deref(), Some("N/A"));
    }

    #[test]
    fn test_fractional_amount() {
        let record = WebhookEvent::parse(br#"{"data":{"transaction":{"amount_in_cents":150}}}"#)
            .unwrap()
            .into_record();
        assert!((record.amount - 1.5).abs() < f64::EPSILON);
        assert_eq!(record.customer_email.as_deref(), Some("N/A"));
    }

    #[test]
    fn test_null_email_kept_null() {
        let record = WebhookEvent::parse(
            br#"{"data":{"transaction":{"amount_in_cents":150.5,"customer_email":null}}}"#,
        )
        .unwrap()
        .into_record();
        assert!((record.amount - 1.505).abs() < 1e-9);
        assert_eq!(record.customer_email, None);

        let value = serde_json::to_value(&record).unwrap();
        assert!(value["customer_email"].is_null());
    }

    #[test]
    fn test_serialized_field_order() {
        let record = WebhookEvent::parse(APPROVED.as_bytes()).unwrap().into_record();
        let json = serde_json::to_string(&record).unwrap();
        let keys = [
            "timestamp", "event_type", "transaction_id", "reference", "status", "amount",
            "currency", "payment_method", "created_at", "customer_email",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(&format!("\"{k}\"")).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
    }

    #[test]
    fn test_invalid_json() {
        assert!(WebhookEvent::parse(b"not json").is_err());
    }
}
