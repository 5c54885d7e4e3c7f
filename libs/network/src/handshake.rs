//! Sign-on and sign-off handshakes
//!
//! Both run on an already open [`Connection`] and never open or close it; the caller
//! decides what to do with a connection whose session was refused.

use crate::connection::Connection;
use crate::error::Result;
use codec::{IsoMessage, MessageKind, NetworkCode};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a sign-on request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOnStatus {
    /// 0810 with response code 00 echoing 001
    Success,
    /// No reply, timeout, I/O failure, or any other reply
    Failure,
    /// Front end answered with a sign-off (002)
    SignOffAdviceReceived,
}

impl fmt::Display for SignOnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignOnStatus::Success => "success",
            SignOnStatus::Failure => "failure",
            SignOnStatus::SignOffAdviceReceived => "sign-off advice received",
        })
    }
}

impl SignOnStatus {
    /// Map a front-end reply to a sign-on outcome
    pub fn from_reply(reply: &IsoMessage) -> Self {
        match reply.kind() {
            MessageKind::NetworkResponse(NetworkCode::SignOn) if reply.is_approved() => {
                SignOnStatus::Success
            }
            MessageKind::NetworkResponse(NetworkCode::SignOff) => {
                SignOnStatus::SignOffAdviceReceived
            }
            _ => SignOnStatus::Failure,
        }
    }
}

/// Send 0800/001 and classify the reply received within `timeout`
pub async fn perform_sign_on(connection: &Connection, timeout: Duration) -> SignOnStatus {
    let endpoint = connection.endpoint();
    let request = IsoMessage::network_request(NetworkCode::SignOn);

    let status = match connection.exchange(&request, timeout).await {
        Ok(reply) => {
            let status = SignOnStatus::from_reply(&reply);
            if status == SignOnStatus::Failure {
                warn!(
                    endpoint = %endpoint,
                    mti = reply.mti(),
                    response_code = reply.response_code().unwrap_or("-"),
                    "Unexpected sign-on reply"
                );
            }
            status
        }
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "Sign-on got no usable reply");
            SignOnStatus::Failure
        }
    };

    match status {
        SignOnStatus::Success => info!(endpoint = %endpoint, "Signed on"),
        SignOnStatus::SignOffAdviceReceived => {
            warn!(endpoint = %endpoint, "Front end answered sign-on with sign-off advice")
        }
        SignOnStatus::Failure => {}
    }
    status
}

/// Send 0800/002, then drain the peer's 0810 for up to `timeout`
///
/// Only the write can fail; a missing or odd reply is logged and ignored.
pub async fn send_sign_off(connection: &Connection, timeout: Duration) -> Result<()> {
    let endpoint = connection.endpoint();
    connection
        .send(&IsoMessage::network_request(NetworkCode::SignOff), timeout)
        .await?;
    info!(endpoint = %endpoint, "Sign-off sent");

    match connection.receive(timeout).await {
        Ok(reply) => debug!(
            endpoint = %endpoint,
            kind = ?reply.kind(),
            "Sign-off acknowledged"
        ),
        Err(e) => debug!(endpoint = %endpoint, error = %e, "No sign-off acknowledgement"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reply() {
        let ok = IsoMessage::network_response(NetworkCode::SignOn, "00");
        assert_eq!(SignOnStatus::from_reply(&ok), SignOnStatus::Success);

        let declined = IsoMessage::network_response(NetworkCode::SignOn, "91");
        assert_eq!(SignOnStatus::from_reply(&declined), SignOnStatus::Failure);

        let advice = IsoMessage::network_response(NetworkCode::SignOff, "00");
        assert_eq!(
            SignOnStatus::from_reply(&advice),
            SignOnStatus::SignOffAdviceReceived
        );

        let echo = IsoMessage::network_response(NetworkCode::EchoTest, "00");
        assert_eq!(SignOnStatus::from_reply(&echo), SignOnStatus::Failure);

        let request = IsoMessage::network_request(NetworkCode::SignOn);
        assert_eq!(SignOnStatus::from_reply(&request), SignOnStatus::Failure);
    }
}
