//! Host filesystem-backed Commodore disk drive.
//!
//! Implements the [`serial_bus::SerialDriver`] contract on top of a host
//! directory instead of a disk image: file channels become host file I/O,
//! channel 15 runs a small CBM DOS command set, and LOAD"$" fabricates a
//! directory listing from the directory contents. The guest never sees
//! host errors, only DOS error numbers on the command channel.

mod directory;
mod dos;
mod fsdevice;
pub mod petscii;

pub use dos::DosError;
pub use fsdevice::FsDevice;
