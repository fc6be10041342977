//! Storage driver interface for bus devices.

use crate::{ST_EOF, ST_OK};

/// Storage backend for one bus device.
///
/// The bus resolves a driver by device number and calls it synchronously
/// from the emulated CPU's execution path. Every operation reports a
/// serial status byte (0 = success); failures are status values for the
/// guest, never host-visible errors.
pub trait SerialDriver {
    /// Open `channel`. `name` is `None` for a bare OPEN CHANNEL command
    /// (secondary $6x) and the accumulated filename or command string for
    /// OPEN FILE (secondary $Fx).
    fn open(&mut self, name: Option<&[u8]>, channel: usize) -> u8;

    /// Close `channel`.
    fn close(&mut self, channel: usize) -> u8;

    /// Write one byte to `channel`.
    fn put(&mut self, byte: u8, channel: usize) -> u8;

    /// Read one byte from `channel`, returning `(data, status)`. The
    /// status carries the EOF/error bits that accompany the data byte.
    fn get(&mut self, channel: usize) -> (u8, u8);

    /// Called after every OPEN CHANNEL / OPEN FILE command on `channel`.
    /// Drivers that buffer command-channel strings execute them here.
    fn flush(&mut self, _channel: usize) {}

    /// LISTEN/TALK/UNLISTEN notification, sent to storage drives only.
    /// Drivers with write-behind buffers flush them here.
    fn listen(&mut self, _channel: usize) {}
}

/// Driver for non-storage device numbers (printer, RS232): a byte sink.
///
/// Every operation succeeds; reads return nothing but EOF.
#[derive(Debug, Default)]
pub struct NullDriver;

impl NullDriver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SerialDriver for NullDriver {
    fn open(&mut self, _name: Option<&[u8]>, _channel: usize) -> u8 {
        ST_OK
    }

    fn close(&mut self, _channel: usize) -> u8 {
        ST_OK
    }

    fn put(&mut self, _byte: u8, _channel: usize) -> u8 {
        ST_OK
    }

    fn get(&mut self, _channel: usize) -> (u8, u8) {
        (0, ST_EOF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_driver_accepts_everything() {
        let mut drv = NullDriver::new();
        assert_eq!(drv.open(Some(b"ANYTHING"), 2), ST_OK);
        assert_eq!(drv.put(0xAB, 2), ST_OK);
        assert_eq!(drv.get(2), (0, ST_EOF));
        assert_eq!(drv.close(2), ST_OK);
    }
}
