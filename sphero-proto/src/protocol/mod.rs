/// First start-of-packet byte, present on every frame.
pub const SOP1: u8 = 0xff;

/// SOP2 of a synchronous response, and the default for outgoing commands.
pub const SOP2_SYNC: u8 = 0xff;

/// SOP2 of an asynchronous (device-initiated) response.
pub const SOP2_ASYNC: u8 = 0xfe;

/// Bits that are always set in an outgoing SOP2.
pub const SOP2_BASE: u8 = 0xfc;

/// Outgoing SOP2 flag: the device should reply with a sync response.
pub const SOP2_ANSWER: u8 = 0x01;

/// Outgoing SOP2 flag: reset the device's client inactivity timeout.
pub const SOP2_RESET_TIMEOUT: u8 = 0x02;

/// Bytes before the payload of any inbound packet: SOP1, SOP2, and
/// three bytes ending in the length field.
pub const HEADER_LEN: usize = 5;

/// Smallest complete packet: a header plus the checksum byte.
pub const MIN_PACKET_SIZE: usize = HEADER_LEN + 1;

/// Largest payload of an outgoing command. DLEN also counts the
/// checksum, and has to fit in one byte.
pub const MAX_DATA_LEN: usize = 253;

/// Serial link speed used by the device.
pub const BAUD_RATE: u32 = 115200;

pub mod checksum;
pub use checksum::checksum;

pub mod check;
pub use check::{check_expected_size, check_min_size, check_sops, Variant};

mod command;
pub use command::*;

mod response;
pub use response::*;

pub mod serialize;
pub use serialize::Serializer;

mod codec;
pub use codec::*;
