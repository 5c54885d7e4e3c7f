//! # Codec Integration Tests
//!
//! Public API behaviour of the packager over the full ISO 8583:1987 dictionary:
//! - round trip for any dictionary-conformant message
//! - truncation and garbage input always surface as `ProtocolError`
//! - authorization request frames as the front ends expect them

use codec::{
    decode, encode, FieldClass, FieldDictionary, FieldLength, IsoMessage, IsoPackager,
    MessageKind, NetworkCode, ProtocolError, MIN_FRAME_LEN,
};
use proptest::prelude::*;
use proptest::string::string_regex;

fn value_pattern(class: FieldClass, length: FieldLength) -> String {
    let chars = match class {
        FieldClass::Numeric => "[0-9]",
        FieldClass::Track2 => "[0-9=]",
        FieldClass::AlphaNumeric => "[A-Za-z0-9 ]",
        FieldClass::AlphaNumericSpecial => "[ -~]",
    };
    match length {
        FieldLength::Fixed(width) => format!("{}{{{}}}", chars, width),
        FieldLength::LlVar(max) => format!("{}{{1,{}}}", chars, max),
        // keep generated frames small, the prefix logic is the same
        FieldLength::LllVar(max) => format!("{}{{1,{}}}", chars, max.min(64)),
    }
}

fn dictionary_message() -> impl Strategy<Value = IsoMessage> {
    let fields: Vec<BoxedStrategy<Option<(u8, String)>>> = FieldDictionary::iso87()
        .iter()
        .map(|spec| {
            let number = spec.number;
            let values = string_regex(&value_pattern(spec.class, spec.length)).unwrap();
            proptest::option::of(values.prop_map(move |v| (number, v))).boxed()
        })
        .collect();

    ("[0-9]{4}", fields).prop_map(|(mti, fields)| {
        fields
            .into_iter()
            .flatten()
            .fold(IsoMessage::builder(mti), |b, (n, v)| b.field(n, v))
            .build()
            .unwrap()
    })
}

proptest! {
    #[test]
    fn prop_round_trip(message in dictionary_message()) {
        let frame = encode(&message).unwrap();
        prop_assert_eq!(decode(&frame).unwrap(), message);
    }

    #[test]
    fn prop_truncated_frames_are_protocol_errors(message in dictionary_message(), cut in 0usize..512) {
        let frame = encode(&message).unwrap();
        let len = cut % frame.len();
        prop_assert!(decode(&frame[..len]).is_err());

        // same prefix with a header rewritten to agree with it
        if len >= MIN_FRAME_LEN {
            let mut patched = frame[..len].to_vec();
            patched[..4].copy_from_slice(&((len - 4) as u32).to_be_bytes());
            prop_assert!(decode(&patched).is_err());
        }
    }

    #[test]
    fn prop_garbage_never_panics(data in proptest::collection::vec(any::<u8>(), 0..128)) {
        let _ = decode(&data);
    }
}

#[test]
fn test_authorization_request_round_trip() {
    let request = IsoMessage::builder("0100")
        .field(2, "4111111111111111")
        .field(3, "000000")
        .field(4, "000000000100")
        .field(7, "1016123045")
        .field(11, "000001")
        .field(14, "2512")
        .field(35, "4111111111111111=2512")
        .field(37, "000000000001")
        .field(70, "001")
        .field(126, "private")
        .build()
        .unwrap();

    let packager = IsoPackager::default();
    let frame = packager.encode(&request).unwrap();
    let decoded = packager.decode(&frame).unwrap();
    assert_eq!(decoded, request);
    assert_eq!(decoded.kind(), MessageKind::AuthRequest);
}

#[test]
fn test_short_fixed_values_come_back_padded() {
    let request = IsoMessage::builder("0100")
        .field(4, "0000000100")
        .field(41, "T1")
        .build()
        .unwrap();
    let decoded = decode(&encode(&request).unwrap()).unwrap();
    assert_eq!(decoded.get(4), Some("000000000100"));
    assert_eq!(decoded.get(41), Some("T1      "));
}

#[test]
fn test_frame_shorter_than_header_and_bitmap() {
    assert!(matches!(
        decode(&[0, 0, 0, 8, b'0', b'8', b'0', b'0', 0x80, 0, 0]),
        Err(ProtocolError::FrameTooSmall { need: 12, got: 11, .. })
    ));
}

#[test]
fn test_bitmap_claims_field_beyond_remaining_bytes() {
    let frame = encode(&IsoMessage::network_response(NetworkCode::SignOn, "00")).unwrap();
    // drop field 70 but keep its bitmap bit, fixing the header to match
    let mut truncated = frame[..frame.len() - 3].to_vec();
    let body = (truncated.len() - 4) as u32;
    truncated[..4].copy_from_slice(&body.to_be_bytes());

    assert!(matches!(
        decode(&truncated),
        Err(ProtocolError::TruncatedField { field: 70, .. })
    ));
}
