//! Authorization request assembly
//!
//! A raw request arrives as 28 positional values. Position `i` lands in field
//! [`AUTH_REQUEST_FIELDS`]`[i]`; empty values are left out of the message.

use crate::error::DispatchError;
use codec::{IsoMessage, MTI_AUTH_REQUEST};

/// Field number for each position of a raw authorization record
pub const AUTH_REQUEST_FIELDS: [u8; 28] = [
    2,   // PAN
    3,   // processing code
    4,   // amount
    7,   // transmission date/time
    11,  // STAN
    12,  // local time
    13,  // local date
    14,  // expiry
    17,  // capture date
    18,  // merchant category code
    22,  // POS entry mode
    24,  // NII
    25,  // POS condition code
    27,  // approval code length
    32,  // acquirer id
    35,  // track 2
    37,  // retrieval reference
    41,  // terminal id
    42,  // merchant id
    43,  // merchant name and location
    48,  // additional data
    49,  // currency code
    60,  // terminal type
    61,  // card issuer
    63,  // private data
    121, 123, 126,
];

/// Build an 0100 from a positional record
pub fn build_auth_request<S: AsRef<str>>(values: &[S]) -> Result<IsoMessage, DispatchError> {
    if values.len() != AUTH_REQUEST_FIELDS.len() {
        return Err(DispatchError::FieldCount {
            expected: AUTH_REQUEST_FIELDS.len(),
            got: values.len(),
        });
    }
    let message = AUTH_REQUEST_FIELDS
        .iter()
        .zip(values)
        .fold(IsoMessage::builder(MTI_AUTH_REQUEST), |b, (&field, value)| {
            b.optional_field(field, value.as_ref())
        })
        .build()?;
    Ok(message)
}

/// The eight fields every authorization must carry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationFields {
    pub pan: String,
    pub processing_code: String,
    pub amount: String,
    pub transmission_date_time: String,
    pub stan: String,
    pub expiry: String,
    pub track2: String,
    pub reference: String,
}

impl AuthorizationFields {
    /// Value carried for `field`, if it is one of the eight
    pub fn get(&self, field: u8) -> Option<&str> {
        let value = match field {
            2 => &self.pan,
            3 => &self.processing_code,
            4 => &self.amount,
            7 => &self.transmission_date_time,
            11 => &self.stan,
            14 => &self.expiry,
            35 => &self.track2,
            37 => &self.reference,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// 0100 carrying only these fields
    pub fn to_message(&self) -> Result<IsoMessage, DispatchError> {
        let message = [2u8, 3, 4, 7, 11, 14, 35, 37]
            .into_iter()
            .fold(IsoMessage::builder(MTI_AUTH_REQUEST), |b, field| {
                b.optional_field(field, self.get(field).unwrap_or_default())
            })
            .build()?;
        Ok(message)
    }
}
