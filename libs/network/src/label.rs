//! Front-end endpoint labels

use std::fmt;
use std::str::FromStr;

/// One of the two front-end processors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointLabel {
    Fe1,
    Fe2,
}

impl EndpointLabel {
    /// Both labels in preference order
    pub const ALL: [EndpointLabel; 2] = [EndpointLabel::Fe1, EndpointLabel::Fe2];

    /// The peer endpoint used for fallback
    pub fn other(self) -> Self {
        match self {
            EndpointLabel::Fe1 => EndpointLabel::Fe2,
            EndpointLabel::Fe2 => EndpointLabel::Fe1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointLabel::Fe1 => "FE1",
            EndpointLabel::Fe2 => "FE2",
        }
    }
}

impl fmt::Display for EndpointLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FE1" => Ok(EndpointLabel::Fe1),
            "FE2" => Ok(EndpointLabel::Fe2),
            other => Err(format!("unknown endpoint label '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_is_involution() {
        for label in EndpointLabel::ALL {
            assert_ne!(label.other(), label);
            assert_eq!(label.other().other(), label);
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("fe1".parse::<EndpointLabel>().unwrap(), EndpointLabel::Fe1);
        assert_eq!(EndpointLabel::Fe2.to_string(), "FE2");
        assert!("FE3".parse::<EndpointLabel>().is_err());
    }
}
