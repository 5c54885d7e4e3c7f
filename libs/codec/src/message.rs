//! # ISO 8583 Message Model
//!
//! An [`IsoMessage`] is an MTI plus an ordered set of numbered string fields. Messages
//! are assembled with [`IsoMessageBuilder`] and are immutable afterwards; the same type
//! is produced by the packager on decode, so callers that only want to display or store
//! a received message can walk [`IsoMessage::fields`] directly.

use crate::constants::{
    FIELD_NETWORK_CODE, FIELD_RESPONSE_CODE, MAX_FIELD, MIN_FIELD, MTI_LEN, MTI_NETWORK_REQUEST,
    MTI_NETWORK_RESPONSE, RESPONSE_APPROVED,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::network::{MessageKind, NetworkCode};
use std::collections::BTreeMap;

/// Decoded or ready-to-encode ISO 8583 message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoMessage {
    mti: String,
    fields: BTreeMap<u8, String>,
}

impl IsoMessage {
    /// Start building a message with the given MTI
    pub fn builder(mti: impl Into<String>) -> IsoMessageBuilder {
        IsoMessageBuilder::new(mti)
    }

    /// 0800 request carrying only the network management code
    pub fn network_request(code: NetworkCode) -> Self {
        Self {
            mti: MTI_NETWORK_REQUEST.to_string(),
            fields: BTreeMap::from([(FIELD_NETWORK_CODE, code.as_str().to_string())]),
        }
    }

    /// 0810 response echoing `code` with the given response code
    pub fn network_response(code: NetworkCode, response_code: &str) -> Self {
        Self {
            mti: MTI_NETWORK_RESPONSE.to_string(),
            fields: BTreeMap::from([
                (FIELD_RESPONSE_CODE, response_code.to_string()),
                (FIELD_NETWORK_CODE, code.as_str().to_string()),
            ]),
        }
    }

    pub fn mti(&self) -> &str {
        &self.mti
    }

    /// Value of `field`, if present
    pub fn get(&self, field: u8) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn has_field(&self, field: u8) -> bool {
        self.fields.contains_key(&field)
    }

    /// Present fields in ascending order
    pub fn fields(&self) -> impl Iterator<Item = (u8, &str)> {
        self.fields.iter().map(|(n, v)| (*n, v.as_str()))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field 39
    pub fn response_code(&self) -> Option<&str> {
        self.get(FIELD_RESPONSE_CODE)
    }

    /// Field 70, parsed
    pub fn network_code(&self) -> Option<NetworkCode> {
        self.get(FIELD_NETWORK_CODE).and_then(NetworkCode::parse)
    }

    /// Field 39 equals "00"
    pub fn is_approved(&self) -> bool {
        self.response_code() == Some(RESPONSE_APPROVED)
    }

    /// Classify once by MTI and network code
    pub fn kind(&self) -> MessageKind {
        MessageKind::classify(self)
    }
}

/// Builder for [`IsoMessage`]
///
/// Field numbers and the MTI are checked at `build` time. Value constraints are
/// checked by the packager because they depend on the field dictionary in use.
#[derive(Debug, Clone)]
pub struct IsoMessageBuilder {
    mti: String,
    fields: BTreeMap<u8, String>,
}

impl IsoMessageBuilder {
    pub fn new(mti: impl Into<String>) -> Self {
        Self {
            mti: mti.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set `field`, replacing any previous value
    pub fn field(mut self, field: u8, value: impl Into<String>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    /// Set `field` unless `value` is empty
    pub fn optional_field(self, field: u8, value: &str) -> Self {
        if value.is_empty() {
            self
        } else {
            self.field(field, value)
        }
    }

    pub fn build(self) -> ProtocolResult<IsoMessage> {
        validate_mti(&self.mti)?;
        if let Some((&field, _)) = self
            .fields
            .iter()
            .find(|(n, _)| !(MIN_FIELD..=MAX_FIELD).contains(*n))
        {
            return Err(ProtocolError::UnknownField { field });
        }
        Ok(IsoMessage {
            mti: self.mti,
            fields: self.fields,
        })
    }
}

/// MTI must be exactly four ASCII digits
pub fn validate_mti(mti: &str) -> ProtocolResult<()> {
    if mti.len() == MTI_LEN && mti.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidMti {
            mti: mti.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_orders_fields() {
        let msg = IsoMessage::builder("0100")
            .field(37, "REF000000001")
            .field(2, "4111111111111111")
            .field(11, "000123")
            .build()
            .unwrap();

        let order: Vec<u8> = msg.fields().map(|(n, _)| n).collect();
        assert_eq!(order, vec![2, 11, 37]);
        assert_eq!(msg.get(2), Some("4111111111111111"));
        assert_eq!(msg.get(3), None);
    }

    #[test]
    fn test_builder_rejects_bad_mti_and_field_range() {
        assert!(matches!(
            IsoMessage::builder("01A0").build(),
            Err(ProtocolError::InvalidMti { .. })
        ));
        assert!(matches!(
            IsoMessage::builder("010").build(),
            Err(ProtocolError::InvalidMti { .. })
        ));
        assert_eq!(
            IsoMessage::builder("0100").field(1, "x").build(),
            Err(ProtocolError::UnknownField { field: 1 })
        );
        assert_eq!(
            IsoMessage::builder("0100").field(200, "x").build(),
            Err(ProtocolError::UnknownField { field: 200 })
        );
    }

    #[test]
    fn test_optional_field_skips_empty() {
        let msg = IsoMessage::builder("0100")
            .optional_field(48, "")
            .optional_field(49, "840")
            .build()
            .unwrap();
        assert!(!msg.has_field(48));
        assert_eq!(msg.get(49), Some("840"));
    }

    #[test]
    fn test_network_messages() {
        let sign_on = IsoMessage::network_request(NetworkCode::SignOn);
        assert_eq!(sign_on.mti(), "0800");
        assert_eq!(sign_on.network_code(), Some(NetworkCode::SignOn));
        assert_eq!(sign_on.field_count(), 1);

        let reply = IsoMessage::network_response(NetworkCode::EchoTest, "00");
        assert_eq!(reply.mti(), "0810");
        assert!(reply.is_approved());
        assert_eq!(reply.get(70), Some("301"));
    }
}
