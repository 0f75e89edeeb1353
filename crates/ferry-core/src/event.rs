use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Queue payload announcing that a named file is ready for transfer.
///
/// The wire format is a JSON object with exactly two fields; the timestamp
/// is stamped at the moment the event is built, not when it is delivered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub timestamp: String,
    pub filename: String,
}

impl TransferEvent {
    pub fn new(filename: impl Into<String>) -> Self {
        TransferEvent {
            timestamp: Utc::now().to_rfc3339(),
            filename: filename.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_exactly_two_fields() {
        let event = TransferEvent::new("report.csv");
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["filename"], "report.csv");
        assert!(object["timestamp"].is_string());
    }

    #[test]
    fn round_trips_through_json() {
        let event = TransferEvent::new("a.xml");
        let parsed = TransferEvent::from_json(event.to_json().unwrap().as_bytes()).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let event = TransferEvent::new("x");
        assert!(chrono::DateTime::parse_from_rfc3339(&event.timestamp).is_ok());
    }
}
