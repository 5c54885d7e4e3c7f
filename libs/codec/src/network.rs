//! Network management codes and message classification

use crate::constants::{
    MTI_AUTH_REQUEST, MTI_AUTH_RESPONSE, MTI_NETWORK_REQUEST, MTI_NETWORK_RESPONSE,
};
use crate::message::IsoMessage;
use num_enum::TryFromPrimitive;
use std::fmt;

/// Field 70 network management information codes
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum NetworkCode {
    /// Open a logical session on the connection
    SignOn = 1,
    /// Close the logical session
    SignOff = 2,
    /// Heartbeat
    EchoTest = 301,
}

impl NetworkCode {
    /// Three-digit wire form
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkCode::SignOn => "001",
            NetworkCode::SignOff => "002",
            NetworkCode::EchoTest => "301",
        }
    }

    /// Parse the three-digit wire form
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() != 3 {
            return None;
        }
        value
            .parse::<u16>()
            .ok()
            .and_then(|n| Self::try_from(n).ok())
    }
}

impl fmt::Display for NetworkCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a message is, decided once from its MTI and field 70
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    SignOn,
    SignOff,
    EchoTest,
    AuthRequest,
    AuthResponse,
    /// 0810 answering the given network request
    NetworkResponse(NetworkCode),
    Unknown,
}

impl MessageKind {
    pub fn classify(message: &IsoMessage) -> Self {
        match (message.mti(), message.network_code()) {
            (MTI_NETWORK_REQUEST, Some(NetworkCode::SignOn)) => MessageKind::SignOn,
            (MTI_NETWORK_REQUEST, Some(NetworkCode::SignOff)) => MessageKind::SignOff,
            (MTI_NETWORK_REQUEST, Some(NetworkCode::EchoTest)) => MessageKind::EchoTest,
            (MTI_NETWORK_RESPONSE, Some(code)) => MessageKind::NetworkResponse(code),
            (MTI_AUTH_REQUEST, _) => MessageKind::AuthRequest,
            (MTI_AUTH_RESPONSE, _) => MessageKind::AuthResponse,
            _ => MessageKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_code_parse() {
        assert_eq!(NetworkCode::parse("001"), Some(NetworkCode::SignOn));
        assert_eq!(NetworkCode::parse("002"), Some(NetworkCode::SignOff));
        assert_eq!(NetworkCode::parse("301"), Some(NetworkCode::EchoTest));
        assert_eq!(NetworkCode::parse("1"), None);
        assert_eq!(NetworkCode::parse("999"), None);
        assert_eq!(NetworkCode::try_from(301u16).unwrap(), NetworkCode::EchoTest);
    }

    #[test]
    fn test_classify() {
        let sign_off = IsoMessage::network_request(NetworkCode::SignOff);
        assert_eq!(sign_off.kind(), MessageKind::SignOff);

        let echo_reply = IsoMessage::network_response(NetworkCode::EchoTest, "00");
        assert_eq!(
            echo_reply.kind(),
            MessageKind::NetworkResponse(NetworkCode::EchoTest)
        );

        let auth = IsoMessage::builder("0110").field(39, "00").build().unwrap();
        assert_eq!(auth.kind(), MessageKind::AuthResponse);

        let other = IsoMessage::builder("0400").build().unwrap();
        assert_eq!(other.kind(), MessageKind::Unknown);

        let bare_network = IsoMessage::builder("0800").build().unwrap();
        assert_eq!(bare_network.kind(), MessageKind::Unknown);
    }
}
