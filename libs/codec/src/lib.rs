//! # ISO 8583 Codec
//!
//! ## Purpose
//!
//! The "rules" layer of the front-end client: everything needed to turn an
//! authorization or network management message into bytes and back, with no I/O and
//! no connection state.
//!
//! - [`FieldDictionary`]: field number to class/length rule (ISO 8583:1987, ASCII)
//! - [`Bitmap`]: presence bitmap with on-demand extension block
//! - [`IsoMessage`] / [`IsoMessageBuilder`]: immutable message model
//! - [`IsoPackager`]: frame encode/decode bound to a dictionary
//! - [`NetworkCode`] / [`MessageKind`]: closed classification of what arrived
//!
//! ## Architecture Role
//!
//! ```text
//! authorizer ──> [codec] ──> network
//!  field map     pack/unpack   framed TCP exchange
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Socket handling, timeouts or retries (belongs in `network`)
//! - Business validation of card data (belongs in `authorizer`)

pub mod bitmap;
pub mod constants;
pub mod error;
pub mod fields;
pub mod message;
pub mod network;
pub mod packager;

pub use bitmap::Bitmap;
pub use constants::*;
pub use error::{ProtocolError, ProtocolResult};
pub use fields::{FieldClass, FieldDictionary, FieldLength, FieldSpec};
pub use message::{IsoMessage, IsoMessageBuilder};
pub use network::{MessageKind, NetworkCode};
pub use packager::{body_len, decode, encode, IsoPackager};
