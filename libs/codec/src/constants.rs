//! # Wire Constants
//!
//! Message type indicators, network management codes and frame geometry for the
//! ISO 8583:1987 ASCII dialect spoken by the acquirer front ends.
//!
//! ```text
//! +--------+------+----------------+------------------+--------------------+
//! | len u32|  MTI | primary bitmap | [extension bmap] | fields, ascending  |
//! | 4 (BE) |  4   |       8        |       8          |  per dictionary    |
//! +--------+------+----------------+------------------+--------------------+
//! ```

/// Authorization request
pub const MTI_AUTH_REQUEST: &str = "0100";
/// Authorization response
pub const MTI_AUTH_RESPONSE: &str = "0110";
/// Network management request (sign-on, sign-off, echo test)
pub const MTI_NETWORK_REQUEST: &str = "0800";
/// Network management response
pub const MTI_NETWORK_RESPONSE: &str = "0810";

/// Response code field
pub const FIELD_RESPONSE_CODE: u8 = 39;
/// Network management information code field
pub const FIELD_NETWORK_CODE: u8 = 70;

/// Field 39 value for an accepted request
pub const RESPONSE_APPROVED: &str = "00";

/// Length prefix preceding every frame
pub const HEADER_LEN: usize = 4;
/// Message type indicator width
pub const MTI_LEN: usize = 4;
/// Width of one bitmap block (primary or extension)
pub const BITMAP_LEN: usize = 8;
/// Shortest byte sequence `decode` will look at
pub const MIN_FRAME_LEN: usize = HEADER_LEN + BITMAP_LEN;
/// Upper bound on a frame body; larger length headers are treated as corruption
pub const MAX_BODY_LEN: usize = 8 * 1024;

/// Lowest field number a caller may set (field 1 is the extension-bitmap flag)
pub const MIN_FIELD: u8 = 2;
/// Highest field number the dictionary may ever describe
pub const MAX_FIELD: u8 = 128;
