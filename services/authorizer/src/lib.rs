//! # Authorizer
//!
//! ## Purpose
//!
//! Turns authorization records into validated ISO 8583 0100 requests and sends them
//! to the two front ends through the link engine, alternating on success and failing
//! over on error.
//!
//! ## Architecture Role
//!
//! ```text
//!  iso_client ──> Dispatcher ──> validator ──> ConnectionSource::connection(label)
//!                     │                              │
//!                     │                       network::ConnectionManager
//!                     └──> AuthorizationSink   (sign-on, heartbeat, reconnect)
//! ```
//!
//! The dispatcher never changes endpoint state. It only borrows signed-on
//! connections and reports what happened.

pub mod dispatcher;
pub mod error;
pub mod link;
pub mod logging;
pub mod record;
pub mod request;
pub mod validator;

pub use dispatcher::{ConnectionSource, Dispatcher, SendOutcome, DEFAULT_RESPONSE_TIMEOUT};
pub use error::{DispatchError, EndpointFailure, SinkError, ValidationError};
pub use link::{connection_manager, link_settings};
pub use logging::init_tracing;
pub use record::{mask_pan, AuthorizationRecord, AuthorizationSink, MemorySink, TracingSink};
pub use request::{build_auth_request, AuthorizationFields, AUTH_REQUEST_FIELDS};
pub use validator::{validate, validate_message};
