//! Client and audio models shared between the API and its collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Mutable profile fields of a client, as submitted on register/update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub full_name: String,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub notification_methods: Vec<String>,
}

impl ClientInfo {
    /// Reject profiles that no store should accept
    pub fn validate(&self) -> Result<()> {
        if self.full_name.trim().is_empty() {
            return Err(Error::InvalidInput("fullName must not be empty".to_string()));
        }
        if self.location_name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "locationName must not be empty".to_string(),
            ));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidInput(format!(
                "latitude out of range [-90, 90]: {}",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidInput(format!(
                "longitude out of range [-180, 180]: {}",
                self.longitude
            )));
        }
        if self.notification_methods.iter().any(|m| m.trim().is_empty()) {
            return Err(Error::InvalidInput(
                "notificationMethods must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }

    /// Attach a store-assigned identifier
    pub fn into_client(self, id: impl Into<String>) -> Client {
        Client {
            id: id.into(),
            full_name: self.full_name,
            location_name: self.location_name,
            latitude: self.latitude,
            longitude: self.longitude,
            notification_methods: self.notification_methods,
        }
    }
}

/// A registered client. The identifier is assigned by the store and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[serde(rename = "ID")]
    pub id: String,
    pub full_name: String,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub notification_methods: Vec<String>,
}

/// One uploaded audio sample before identity is attached
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMessage {
    pub timestamp: DateTime<Utc>,
    pub payload: Vec<u8>,
}

/// Message handed to the audio relay
///
/// Wire format: `{"requestID", "clientID", "timestamp" (ns since epoch), "payload" (base64)}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    #[serde(rename = "requestID")]
    pub request_id: Uuid,
    #[serde(rename = "clientID")]
    pub client_id: Uuid,
    pub timestamp: i64,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
}

impl RelayEnvelope {
    pub fn new(request_id: Uuid, client_id: Uuid, message: AudioMessage) -> Result<Self> {
        let timestamp = crate::time::to_unix_nanos(&message.timestamp).ok_or_else(|| {
            Error::InvalidInput(format!(
                "timestamp not representable in nanoseconds: {}",
                message.timestamp
            ))
        })?;

        Ok(Self {
            request_id,
            client_id,
            timestamp,
            payload: message.payload,
        })
    }

    /// Serialized message body, as stored in a queue
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jane() -> ClientInfo {
        ClientInfo {
            full_name: "Jane Doe".to_string(),
            location_name: "Park".to_string(),
            latitude: 52.1,
            longitude: 12.2,
            notification_methods: vec![],
        }
    }

    #[test]
    fn test_client_info_accepts_camel_case_without_methods() {
        let info: ClientInfo = serde_json::from_value(json!({
            "fullName": "Jane Doe",
            "locationName": "Park",
            "latitude": 52.1,
            "longitude": 12.2
        }))
        .unwrap();

        assert_eq!(info, jane());
        assert!(info.validate().is_ok());
    }

    #[test]
    fn test_client_info_validation() {
        let mut info = jane();
        info.full_name = "  ".to_string();
        assert!(info.validate().is_err());

        let mut info = jane();
        info.latitude = 91.0;
        assert!(info.validate().is_err());

        let mut info = jane();
        info.longitude = f64::NAN;
        assert!(info.validate().is_err());

        let mut info = jane();
        info.notification_methods = vec!["sms".to_string(), String::new()];
        assert!(info.validate().is_err());
    }

    #[test]
    fn test_client_serializes_id_as_upper_case() {
        let client = jane().into_client("abc");
        let value = serde_json::to_value(&client).unwrap();
        assert_eq!(value["ID"], "abc");
        assert_eq!(value["fullName"], "Jane Doe");
        assert!(value["notificationMethods"].is_array());
    }

    #[test]
    fn test_envelope_wire_format() {
        let request_id = Uuid::new_v4();
        let client_id = Uuid::new_v4();
        let message = AudioMessage {
            timestamp: crate::time::from_unix_nanos(1_500),
            payload: vec![0, 1, 2, 255],
        };

        let envelope = RelayEnvelope::new(request_id, client_id, message).unwrap();
        let value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(value["requestID"], request_id.to_string());
        assert_eq!(value["clientID"], client_id.to_string());
        assert_eq!(value["timestamp"], 1_500);
        assert_eq!(value["payload"], "AAEC/w==");

        let decoded: RelayEnvelope = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, envelope);
    }
}
