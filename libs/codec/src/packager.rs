//! # ISO 8583 Packager - Frame Encoding and Decoding
//!
//! ## Purpose
//!
//! Stateless conversion between [`IsoMessage`] and length-prefixed wire frames. The
//! packager borrows an immutable [`FieldDictionary`]; the default instance uses the
//! process-wide ISO 8583:1987 dictionary and is cheap to copy into every component
//! that needs it.
//!
//! ## Frame Layout
//!
//! ```text
//! [len: u32 BE][MTI: 4 ASCII][bitmap: 8 (+8)][field values ...]
//!   └─ counts every byte after the header
//! ```
//!
//! ## Failure Model
//!
//! Every malformed input maps to a [`ProtocolError`]: short frames, header/body
//! disagreement, non-numeric MTI, bitmap bits without a dictionary entry, and field
//! lengths running past the end of the buffer. Decoding never indexes out of bounds.

use crate::bitmap::Bitmap;
use crate::constants::{HEADER_LEN, MAX_BODY_LEN, MIN_FRAME_LEN, MTI_LEN};
use crate::error::{ProtocolError, ProtocolResult};
use crate::fields::FieldDictionary;
use crate::message::{validate_mti, IsoMessage, IsoMessageBuilder};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

/// Encoder/decoder bound to one field dictionary
#[derive(Debug, Clone, Copy)]
pub struct IsoPackager {
    dictionary: &'static FieldDictionary,
}

impl Default for IsoPackager {
    fn default() -> Self {
        Self::new(FieldDictionary::iso87())
    }
}

impl IsoPackager {
    pub fn new(dictionary: &'static FieldDictionary) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &'static FieldDictionary {
        self.dictionary
    }

    /// Encode `message` into a complete frame including the length header
    pub fn encode(&self, message: &IsoMessage) -> ProtocolResult<Bytes> {
        validate_mti(message.mti())?;

        let mut bitmap = Bitmap::new();
        for (field, _) in message.fields() {
            self.dictionary.spec(field)?;
            bitmap.set(field);
        }

        let mut body = BytesMut::with_capacity(64);
        body.put_slice(message.mti().as_bytes());
        body.put_slice(&bitmap.to_bytes());
        for (field, value) in message.fields() {
            self.dictionary.spec(field)?.encode_into(value, &mut body)?;
        }

        if body.len() > MAX_BODY_LEN {
            return Err(ProtocolError::FrameTooLarge {
                size: body.len(),
                max: MAX_BODY_LEN,
            });
        }

        let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
        frame.put_u32(body.len() as u32);
        frame.put_slice(&body);

        trace!(
            mti = message.mti(),
            bytes = frame.len(),
            frame = %hex::encode(&frame),
            "Encoded ISO message"
        );
        Ok(frame.freeze())
    }

    /// Decode a complete frame including the length header
    pub fn decode(&self, data: &[u8]) -> ProtocolResult<IsoMessage> {
        if data.len() < MIN_FRAME_LEN {
            return Err(ProtocolError::frame_too_small(
                MIN_FRAME_LEN,
                data.len(),
                "frame header and bitmap",
            ));
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&data[..HEADER_LEN]);
        let declared = body_len(header)?;
        let actual = data.len() - HEADER_LEN;
        if declared != actual {
            return Err(ProtocolError::LengthMismatch { declared, actual });
        }

        trace!(bytes = data.len(), frame = %hex::encode(data), "Decoding ISO frame");

        let mti_bytes = &data[HEADER_LEN..HEADER_LEN + MTI_LEN];
        let mti = String::from_utf8_lossy(mti_bytes).into_owned();
        validate_mti(&mti)?;

        let (bitmap, mut offset) = Bitmap::read(data, HEADER_LEN + MTI_LEN)?;

        let mut builder = IsoMessageBuilder::new(mti);
        for field in bitmap.fields() {
            let spec = self.dictionary.spec(field)?;
            let (value, next) = spec.decode_from(data, offset)?;
            builder = builder.field(field, value);
            offset = next;
        }

        if offset != data.len() {
            return Err(ProtocolError::TrailingBytes {
                extra: data.len() - offset,
            });
        }

        builder.build()
    }
}

/// Body length announced by a frame header, bounded by the protocol maximum
pub fn body_len(header: [u8; HEADER_LEN]) -> ProtocolResult<usize> {
    let declared = u32::from_be_bytes(header) as usize;
    if declared > MAX_BODY_LEN {
        return Err(ProtocolError::FrameTooLarge {
            size: declared,
            max: MAX_BODY_LEN,
        });
    }
    Ok(declared)
}

/// Encode with the default ISO 8583:1987 packager
pub fn encode(message: &IsoMessage) -> ProtocolResult<Bytes> {
    IsoPackager::default().encode(message)
}

/// Decode with the default ISO 8583:1987 packager
pub fn decode(data: &[u8]) -> ProtocolResult<IsoMessage> {
    IsoPackager::default().decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkCode;

    #[test]
    fn test_sign_on_frame_layout() {
        let frame = encode(&IsoMessage::network_request(NetworkCode::SignOn)).unwrap();
        // MTI + two bitmap blocks + field 70
        assert_eq!(&frame[..4], &[0, 0, 0, 23]);
        assert_eq!(&frame[4..8], b"0800");
        assert_eq!(frame[8], 0x80);
        assert_eq!(frame[16], 0x04);
        assert_eq!(&frame[24..], b"001");
        assert_eq!(frame.len(), 27);
    }

    #[test]
    fn test_decode_sign_on_response() {
        let reply = IsoMessage::network_response(NetworkCode::SignOn, "00");
        let frame = encode(&reply).unwrap();
        assert_eq!(decode(&frame).unwrap(), reply);
    }

    #[test]
    fn test_encode_rejects_undictionaried_field() {
        let msg = IsoMessage::builder("0100").field(5, "1").build().unwrap();
        assert_eq!(encode(&msg), Err(ProtocolError::UnknownField { field: 5 }));
    }

    #[test]
    fn test_encode_rejects_constraint_violation() {
        let msg = IsoMessage::builder("0100")
            .field(4, "12AB")
            .build()
            .unwrap();
        assert!(matches!(
            encode(&msg),
            Err(ProtocolError::InvalidCharacters { field: 4, .. })
        ));
    }

    #[test]
    fn test_decode_short_frames() {
        for len in 0..MIN_FRAME_LEN {
            let data = vec![0u8; len];
            assert!(matches!(
                decode(&data),
                Err(ProtocolError::FrameTooSmall { .. })
            ));
        }
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut frame = encode(&IsoMessage::network_request(NetworkCode::EchoTest))
            .unwrap()
            .to_vec();
        frame.push(b'0');
        assert!(matches!(
            decode(&frame),
            Err(ProtocolError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_invalid_mti() {
        let mut frame = encode(&IsoMessage::network_request(NetworkCode::EchoTest))
            .unwrap()
            .to_vec();
        frame[5] = b'X';
        assert!(matches!(
            decode(&frame),
            Err(ProtocolError::InvalidMti { .. })
        ));
    }

    #[test]
    fn test_decode_unknown_bitmap_field() {
        // bitmap claims field 5 which the dictionary does not define
        let mut frame = vec![0, 0, 0, 13];
        frame.extend_from_slice(b"0100");
        frame.extend_from_slice(&[0x08, 0, 0, 0, 0, 0, 0, 0]);
        frame.push(b'1');
        assert_eq!(decode(&frame), Err(ProtocolError::UnknownField { field: 5 }));
    }

    #[test]
    fn test_decode_field_past_end() {
        // bitmap claims field 4 (12 digits) but only 3 bytes follow
        let mut frame = vec![0, 0, 0, 15];
        frame.extend_from_slice(b"0100");
        frame.extend_from_slice(&[0x10, 0, 0, 0, 0, 0, 0, 0]);
        frame.extend_from_slice(b"123");
        assert!(matches!(
            decode(&frame),
            Err(ProtocolError::TruncatedField { field: 4, required: 12, available: 3, .. })
        ));
    }

    #[test]
    fn test_body_len_limit() {
        assert_eq!(body_len([0, 0, 0, 27]).unwrap(), 27);
        assert!(matches!(
            body_len([0xff, 0xff, 0xff, 0xff]),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }
}
