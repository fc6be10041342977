//! Commodore serial bus emulation with filesystem-backed drives.
//!
//! The emulated CPU's KERNAL traps translate serial bus traffic (LISTEN,
//! TALK, OPEN, CLOSE, byte transfers) into calls on [`SerialBus`], which
//! keeps per-device channel state and forwards storage operations to the
//! [`SerialDriver`] attached at each device number. Device numbers 8-15
//! address disk drives; lower numbers are non-storage peripherals such as
//! printers, served by [`NullDriver`].
//!
//! The protocol quirk this layer exists to reproduce: a channel is not
//! really open until the *next* complete command sequence finishes. After
//! an OPEN secondary address the filename arrives one byte at a time, and
//! only the following OPEN CHANNEL or OPEN FILE command consumes it. An
//! already-open channel is only closed and reopened when a new filename
//! actually arrived, so the command channel (15) stays usable while other
//! channels on the same device open and close files.

mod bus;
mod driver;

pub use bus::{ChannelState, SerialBus};
pub use driver::{NullDriver, SerialDriver};

/// Number of addressable bus devices (0-15).
pub const MAX_DEVICES: usize = 16;

/// Channels (secondary address low nibble) per device.
pub const MAX_CHANNELS: usize = 16;

/// The command/status channel.
pub const COMMAND_CHANNEL: usize = 15;

/// First device number that addresses a storage drive.
pub const FIRST_DRIVE: u8 = 8;

/// Filename buffer capacity; bytes accumulated past this are dropped.
pub const NAME_LENGTH: usize = 255;

/// Status byte: operation succeeded.
pub const ST_OK: u8 = 0x00;

/// Status byte: read/write error (the guest reports e.g. FILE NOT FOUND).
pub const ST_ERROR: u8 = 0x02;

/// Status byte: end of file, set alongside the final data byte.
pub const ST_EOF: u8 = 0x40;

/// Status byte: no device answered at this address.
pub const ST_DEVICE_NOT_PRESENT: u8 = 0x83;
