//! Device table, channel state, and the serial command dispatcher.

use crate::{
    COMMAND_CHANNEL, FIRST_DRIVE, MAX_CHANNELS, MAX_DEVICES, NAME_LENGTH, ST_DEVICE_NOT_PRESENT,
    ST_OK, SerialDriver,
};

/// Open state of one channel.
///
/// A channel only ever moves Closed -> AwaitingName -> Open -> Closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No file associated with the channel.
    #[default]
    Closed,
    /// OPEN secondary address seen; filename bytes are accumulating.
    AwaitingName,
    /// The open command sequence completed; data may flow.
    Open,
}

/// One attached device: its driver plus per-channel state.
struct Device {
    driver: Box<dyn SerialDriver>,
    state: [ChannelState; MAX_CHANNELS],
    /// Per-channel read-ahead byte. Vestigial: prefetch is disabled and
    /// every read fetches from the driver, but the byte still travels
    /// through this slot on its way out.
    next_byte: [u8; MAX_CHANNELS],
    /// Read-ahead validity. Vestigial, only ever cleared.
    next_ok: [bool; MAX_CHANNELS],
}

impl Device {
    fn new(driver: Box<dyn SerialDriver>) -> Self {
        Self {
            driver,
            state: [ChannelState::Closed; MAX_CHANNELS],
            next_byte: [0; MAX_CHANNELS],
            next_ok: [false; MAX_CHANNELS],
        }
    }
}

/// The serial bus: device table, shared filename buffer, and the command
/// dispatcher driven by the bus-trap layer.
///
/// All calls are synchronous from the emulated CPU, one at a time. The
/// bus protocol is strictly sequential, so at most one OPEN sequence is
/// in flight bus-wide; that is why a single shared filename buffer is
/// enough. Callers must uphold that sequencing.
pub struct SerialBus {
    devices: [Option<Device>; MAX_DEVICES],
    /// Shared filename/command buffer, filled while a channel awaits its
    /// name and consumed by the next open command.
    name_buf: [u8; NAME_LENGTH],
    name_len: usize,
}

impl SerialBus {
    /// Create a bus with no devices attached.
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: std::array::from_fn(|_| None),
            name_buf: [0; NAME_LENGTH],
            name_len: 0,
        }
    }

    /// Attach a driver at `device` (0-15).
    ///
    /// # Errors
    ///
    /// Fails if a driver is already attached at that number.
    pub fn attach(&mut self, device: u8, driver: Box<dyn SerialDriver>) -> Result<(), String> {
        let unit = usize::from(device & 0x0f);
        if self.devices[unit].is_some() {
            return Err(format!("device {unit} already attached"));
        }
        self.devices[unit] = Some(Device::new(driver));
        Ok(())
    }

    /// Detach the driver at `device`, force-closing its open channels.
    ///
    /// # Errors
    ///
    /// Fails if no driver is attached at that number.
    pub fn detach(&mut self, device: u8) -> Result<(), String> {
        let unit = usize::from(device & 0x0f);
        let Some(dev) = self.devices[unit].as_mut() else {
            return Err(format!("device {unit} not attached"));
        };
        for channel in 0..MAX_CHANNELS {
            if dev.state[channel] != ChannelState::Closed {
                dev.state[channel] = ChannelState::Closed;
                dev.driver.close(channel);
            }
        }
        self.devices[unit] = None;
        Ok(())
    }

    /// Whether a driver is attached at `device`.
    #[must_use]
    pub fn is_attached(&self, device: u8) -> bool {
        self.devices[usize::from(device & 0x0f)].is_some()
    }

    /// Current state of a device's channel. Absent devices read Closed.
    #[must_use]
    pub fn channel_state(&self, device: u8, secondary: u8) -> ChannelState {
        match &self.devices[usize::from(device & 0x0f)] {
            Some(dev) => dev.state[usize::from(secondary & 0x0f)],
            None => ChannelState::Closed,
        }
    }

    /// Handle a serial bus command under attention. Returns the status.
    fn serial_command(&mut self, device: u8, secondary: u8) -> u8 {
        let unit = usize::from(device & 0x0f);
        let channel = usize::from(secondary & 0x0f);
        let Some(dev) = self.devices[unit].as_mut() else {
            return ST_DEVICE_NOT_PRESENT;
        };
        let mut st = ST_OK;

        // Any command other than OPEN CHANNEL invalidates a pending
        // read-ahead byte.
        if secondary & 0xf0 != 0x60 {
            dev.next_ok[channel] = false;
        }

        match secondary & 0xf0 {
            0x20 | 0x30 => {
                log::trace!("LISTEN, device {} (no driver call)", secondary & 0x1f);
            }
            0x40 | 0x50 => {
                log::trace!("TALK, device {} (no driver call)", secondary & 0x1f);
            }
            // Open channel: activate a pending open, then replay the bytes
            // that arrived before the command completed (channel 15
            // command strings work this way).
            0x60 => {
                if dev.state[channel] == ChannelState::AwaitingName {
                    dev.state[channel] = ChannelState::Open;
                    st = dev.driver.open(None, channel);
                    for &byte in &self.name_buf[..self.name_len] {
                        dev.driver.put(byte, channel);
                    }
                    self.name_len = 0;
                }
                dev.driver.flush(channel);
            }
            // Close file.
            0xE0 => {
                dev.state[channel] = ChannelState::Closed;
                st = dev.driver.close(channel);
            }
            // Open file. An already-open channel is only closed and
            // reopened when a new filename actually arrived; the command
            // channel reopens every time. This keeps the status channel
            // continuously open across file traffic on other channels.
            0xF0 => {
                if dev.state[channel] != ChannelState::Closed
                    && (self.name_len != 0 || channel == COMMAND_CHANNEL)
                {
                    dev.driver.close(channel);
                    dev.state[channel] = ChannelState::Open;
                    st = dev.driver.open(Some(&self.name_buf[..self.name_len]), channel);
                    self.name_len = 0;
                    if st != ST_OK {
                        dev.state[channel] = ChannelState::Closed;
                        dev.driver.close(channel);
                        log::error!("cannot open file, status ${st:02x}");
                    }
                }
                dev.driver.flush(channel);
            }
            _ => {
                log::error!("unknown serial command ${secondary:02x}");
            }
        }

        st
    }

    /// OPEN secondary address: the channel starts accumulating a name.
    /// No driver call and no status until the open sequence completes.
    pub fn open(&mut self, device: u8, secondary: u8) {
        let unit = usize::from(device & 0x0f);
        let channel = usize::from(secondary & 0x0f);
        log::trace!("open {unit},{channel}");
        if let Some(dev) = self.devices[unit].as_mut() {
            dev.state[channel] = ChannelState::AwaitingName;
        }
    }

    /// CLOSE: dispatch the close command and report its status.
    pub fn close(&mut self, device: u8, secondary: u8, st_func: impl FnOnce(u8)) {
        let st = self.serial_command(device, secondary);
        st_func(st);
    }

    /// LISTEN or TALK with a secondary address: dispatch, report status,
    /// then give storage drives their listen notification so backends can
    /// flush buffered writes.
    pub fn listen_talk(&mut self, device: u8, secondary: u8, st_func: impl FnOnce(u8)) {
        let st = self.serial_command(device, secondary);
        st_func(st);

        let unit = usize::from(device & 0x0f);
        if unit >= usize::from(FIRST_DRIVE)
            && let Some(dev) = self.devices[unit].as_mut()
        {
            dev.driver.listen(usize::from(secondary & 0x0f));
        }
    }

    /// UNLISTEN. A command-closing secondary ($Fx, or anything addressed
    /// to channel 15) gets a full dispatch; otherwise storage drives only
    /// receive the listen notification and no status is reported.
    pub fn unlisten(&mut self, device: u8, secondary: u8, st_func: impl FnOnce(u8)) {
        let unit = usize::from(device & 0x0f);
        let channel = usize::from(secondary & 0x0f);

        if secondary & 0xf0 == 0xf0 || channel == COMMAND_CHANNEL {
            let st = self.serial_command(device, secondary);
            st_func(st);
            // The read-ahead byte does not survive the end of a command.
            if let Some(dev) = self.devices[unit].as_mut() {
                dev.next_ok[channel] = false;
            }
        } else if unit >= usize::from(FIRST_DRIVE)
            && let Some(dev) = self.devices[unit].as_mut()
        {
            dev.driver.listen(channel);
        }
    }

    /// UNTALK: the protocol requires no action here.
    pub fn untalk(&mut self, _device: u8, _secondary: u8, _st_func: impl FnOnce(u8)) {}

    /// Write one byte to a channel. While the channel awaits its name the
    /// byte lands in the shared filename buffer and produces no status;
    /// otherwise it goes to the driver and the driver's status is
    /// reported.
    pub fn write(&mut self, device: u8, secondary: u8, data: u8, st_func: impl FnOnce(u8)) {
        let unit = usize::from(device & 0x0f);
        let channel = usize::from(secondary & 0x0f);
        let Some(dev) = self.devices[unit].as_mut() else {
            st_func(ST_DEVICE_NOT_PRESENT);
            return;
        };

        if dev.state[channel] == ChannelState::AwaitingName {
            // Bytes past the buffer capacity are dropped.
            if self.name_len < NAME_LENGTH {
                log::trace!("name[{}] = ${data:02x}", self.name_len);
                self.name_buf[self.name_len] = data;
                self.name_len += 1;
            }
        } else {
            st_func(dev.driver.put(data, channel));
        }
    }

    /// Read one byte from a channel. The driver is consulted on every
    /// read: the read-ahead slot is filled and immediately invalidated,
    /// so no prefetch ever takes effect.
    pub fn read(&mut self, device: u8, secondary: u8, st_func: impl FnOnce(u8)) -> u8 {
        let unit = usize::from(device & 0x0f);
        let channel = usize::from(secondary & 0x0f);
        let Some(dev) = self.devices[unit].as_mut() else {
            st_func(ST_DEVICE_NOT_PRESENT);
            return 0;
        };

        let (data, st) = dev.driver.get(channel);
        dev.next_byte[channel] = data;
        let data = dev.next_byte[channel];
        dev.next_ok[channel] = false;
        st_func(st);
        data
    }

    /// Machine reset: force-close every open channel on every attached
    /// device.
    pub fn reset(&mut self) {
        for dev in self.devices.iter_mut().flatten() {
            for channel in 0..MAX_CHANNELS {
                if dev.state[channel] != ChannelState::Closed {
                    dev.state[channel] = ChannelState::Closed;
                    dev.driver.close(channel);
                }
            }
        }
    }
}

impl Default for SerialBus {
    fn default() -> Self {
        Self::new()
    }
}
