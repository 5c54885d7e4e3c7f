//! # Authorization Request Validator
//!
//! Syntactic checks on the eight fields every authorization request must carry.
//! Rules run in field order and the first violation is returned; nothing is sent
//! when validation fails. Each check logs at `debug` when it passes and at `warn`
//! when it rejects, with card data masked.
//!
//! | Field | Name              | Rule                     |
//! |-------|-------------------|--------------------------|
//! | 2     | PAN               | 13 to 19 digits          |
//! | 3     | processing code   | exactly 6 digits         |
//! | 4     | amount            | 1 to 12 digits           |
//! | 7     | date/time         | exactly 10 digits        |
//! | 11    | STAN              | 1 to 6 digits            |
//! | 14    | expiry            | exactly 4 digits         |
//! | 35    | track 2           | digits and `=`, nonempty |
//! | 37    | reference         | 1 to 12 characters       |

use crate::error::ValidationError;
use crate::record::mask_pan;
use crate::request::AuthorizationFields;
use codec::IsoMessage;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

enum Check {
    Pattern(Regex),
    CharCount { min: usize, max: usize },
}

struct Rule {
    field: u8,
    name: &'static str,
    rule: &'static str,
    check: Check,
}

impl Rule {
    fn pattern(field: u8, name: &'static str, rule: &'static str, pattern: &str) -> Self {
        Self {
            field,
            name,
            rule,
            check: Check::Pattern(Regex::new(pattern).unwrap_or_else(|e| {
                panic!("invalid validation pattern for field {}: {}", field, e)
            })),
        }
    }

    fn admits(&self, value: &str) -> bool {
        match &self.check {
            Check::Pattern(re) => re.is_match(value),
            Check::CharCount { min, max } => (*min..=*max).contains(&value.chars().count()),
        }
    }

    fn shown(&self, value: Option<&str>) -> String {
        match value {
            None => "nothing".to_string(),
            Some(v) if self.field == 2 => mask_pan(v),
            Some(v) if self.field == 35 => format!("{} characters", v.chars().count()),
            Some(v) => format!("'{}'", v),
        }
    }
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::pattern(2, "PAN", "13 to 19 digits", r"^[0-9]{13,19}$"),
        Rule::pattern(3, "processing code", "exactly 6 digits", r"^[0-9]{6}$"),
        Rule::pattern(4, "amount", "1 to 12 digits without decimals", r"^[0-9]{1,12}$"),
        Rule::pattern(7, "date/time", "exactly 10 digits (MMDDhhmmss)", r"^[0-9]{10}$"),
        Rule::pattern(11, "STAN", "1 to 6 digits", r"^[0-9]{1,6}$"),
        Rule::pattern(14, "expiry", "exactly 4 digits", r"^[0-9]{4}$"),
        Rule::pattern(35, "track 2", "digits and '=' only", r"^[0-9=]+$"),
        Rule {
            field: 37,
            name: "reference",
            rule: "1 to 12 characters",
            check: Check::CharCount { min: 1, max: 12 },
        },
    ]
});

/// Field numbers checked, in order
pub fn validated_fields() -> impl Iterator<Item = u8> {
    RULES.iter().map(|r| r.field)
}

/// Validate a built request; a missing field fails its rule
pub fn validate_message(message: &IsoMessage) -> Result<(), ValidationError> {
    check_all(|field| message.get(field))
}

/// Validate the eight fields before a request is built
pub fn validate(fields: &AuthorizationFields) -> Result<(), ValidationError> {
    check_all(|field| fields.get(field))
}

fn check_all<'a>(lookup: impl Fn(u8) -> Option<&'a str>) -> Result<(), ValidationError> {
    for rule in RULES.iter() {
        let value = lookup(rule.field);
        match value {
            Some(v) if rule.admits(v) => {
                debug!(field = rule.field, name = rule.name, "Field valid");
            }
            _ => {
                let shown = rule.shown(value);
                warn!(field = rule.field, name = rule.name, value = %shown, "Field rejected: {}", rule.rule);
                return Err(ValidationError {
                    field: rule.field,
                    name: rule.name,
                    rule: rule.rule,
                    shown,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AuthorizationFields {
        AuthorizationFields {
            pan: "4111111111111111".to_string(),
            processing_code: "000000".to_string(),
            amount: "000000010000".to_string(),
            transmission_date_time: "0612103000".to_string(),
            stan: "123456".to_string(),
            expiry: "2612".to_string(),
            track2: "4111111111111111=2612".to_string(),
            reference: "REF000000001".to_string(),
        }
    }

    fn rejected_field(fields: &AuthorizationFields) -> Option<u8> {
        validate(fields).err().map(|e| e.field)
    }

    #[test]
    fn test_valid_request_passes() {
        assert_eq!(validate(&valid()), Ok(()));
        assert_eq!(validated_fields().count(), 8);
    }

    #[test]
    fn test_pan_bounds() {
        let mut f = valid();
        f.pan = "123".into();
        assert_eq!(rejected_field(&f), Some(2));
        f.pan = "1234567890123".into();
        assert_eq!(rejected_field(&f), None);
        f.pan = "1234567890123456789".into();
        assert_eq!(rejected_field(&f), None);
        f.pan = "12345678901234567890".into();
        assert_eq!(rejected_field(&f), Some(2));
        f.pan = "411111111111111A".into();
        assert_eq!(rejected_field(&f), Some(2));
    }

    #[test]
    fn test_amount_rules() {
        let mut f = valid();
        f.amount = "0000000100".into();
        assert_eq!(rejected_field(&f), None);
        f.amount = "1".into();
        assert_eq!(rejected_field(&f), None);
        f.amount = "10.00".into();
        assert_eq!(rejected_field(&f), Some(4));
        f.amount = "".into();
        assert_eq!(rejected_field(&f), Some(4));
        f.amount = "1234567890123".into();
        assert_eq!(rejected_field(&f), Some(4));
    }

    #[test]
    fn test_exact_length_fields() {
        let mut f = valid();
        f.processing_code = "00000".into();
        assert_eq!(rejected_field(&f), Some(3));

        let mut f = valid();
        f.transmission_date_time = "061210300".into();
        assert_eq!(rejected_field(&f), Some(7));

        let mut f = valid();
        f.expiry = "26/12".into();
        assert_eq!(rejected_field(&f), Some(14));
    }

    #[test]
    fn test_stan_track2_reference() {
        let mut f = valid();
        f.stan = "1".into();
        assert_eq!(rejected_field(&f), None);
        f.stan = "1234567".into();
        assert_eq!(rejected_field(&f), Some(11));

        let mut f = valid();
        f.track2 = "".into();
        assert_eq!(rejected_field(&f), Some(35));
        f.track2 = "4111D2612".into();
        assert_eq!(rejected_field(&f), Some(35));

        let mut f = valid();
        f.reference = "".into();
        assert_eq!(rejected_field(&f), Some(37));
        f.reference = "R".into();
        assert_eq!(rejected_field(&f), None);
        f.reference = "REF0000000012".into();
        assert_eq!(rejected_field(&f), Some(37));
    }

    #[test]
    fn test_first_violation_wins() {
        let mut f = valid();
        f.amount = "x".into();
        f.reference = "".into();
        assert_eq!(rejected_field(&f), Some(4));
    }

    #[test]
    fn test_pan_masked_in_error() {
        let mut f = valid();
        f.pan = "41111111111111111111".into();
        let err = validate(&f).unwrap_err();
        assert!(!err.to_string().contains("41111111111111111111"));
        assert!(err.shown.starts_with("411111"));
    }

    #[test]
    fn test_missing_field_in_message() {
        let msg = IsoMessage::builder("0100")
            .field(2, "4111111111111111")
            .build()
            .unwrap();
        let err = validate_message(&msg).unwrap_err();
        assert_eq!(err.field, 3);
        assert_eq!(err.shown, "nothing");
    }
}
