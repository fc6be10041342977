//! The directory-backed drive: channel bookkeeping, filename parsing,
//! and the channel-15 command interpreter.

use std::fs;
use std::path::{Path, PathBuf};

use serial_bus::{COMMAND_CHANNEL, MAX_CHANNELS, ST_EOF, ST_ERROR, ST_OK, SerialDriver};

use crate::directory::{self, DirEntry};
use crate::dos::DosError;
use crate::petscii;

/// Blocks-free figure reported at the end of a listing (a freshly
/// formatted 1541 disk).
const BLOCKS_FREE: u16 = 664;

/// Access mode parsed from the filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessMode {
    Read,
    Write,
    Append,
}

/// A parsed open request.
#[derive(Debug, PartialEq, Eq)]
struct OpenRequest {
    name: String,
    mode: AccessMode,
    overwrite: bool,
}

/// What an open channel is connected to.
enum Transfer {
    /// Reading buffered data: a host file or a fabricated listing.
    Read { data: Vec<u8>, pos: usize },
    /// Writing a host file; bytes buffer until close.
    Write { path: PathBuf, data: Vec<u8> },
}

/// One emulated disk drive mapped onto a host directory.
///
/// Filenames travel as PETSCII and land lowercase on the host; listings
/// go the other way. DOS errors are remembered and reported as the
/// status line on channel 15, never as host-visible failures.
pub struct FsDevice {
    root: PathBuf,
    channels: [Option<Transfer>; MAX_CHANNELS],
    /// Command bytes written to channel 15, executed on flush.
    command: Vec<u8>,
    error: DosError,
    /// Unread tail of the status line; refilled from `error` on demand.
    status: Vec<u8>,
    status_pos: usize,
}

impl FsDevice {
    /// Map a drive onto `root`. Powers up with the DOS version message
    /// on the error channel, like a real drive after reset.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            channels: std::array::from_fn(|_| None),
            command: Vec::new(),
            error: DosError::DosVersion,
            status: Vec::new(),
            status_pos: 0,
        }
    }

    /// Host directory backing the drive.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The error a read of channel 15 would currently report.
    #[must_use]
    pub fn last_error(&self) -> DosError {
        self.error
    }

    fn set_error(&mut self, error: DosError) {
        self.error = error;
        // Force the next status read to re-render the line.
        self.status.clear();
        self.status_pos = 0;
    }

    /// Next byte of the channel-15 status line. Reading the line to its
    /// end resets the stored error to OK.
    fn status_byte(&mut self) -> (u8, u8) {
        if self.status_pos >= self.status.len() {
            self.status = self.error.status_line();
            self.status_pos = 0;
        }
        let byte = self.status[self.status_pos];
        self.status_pos += 1;
        if self.status_pos >= self.status.len() {
            self.error = DosError::Ok;
            (byte, ST_EOF)
        } else {
            (byte, ST_OK)
        }
    }

    /// Directory entries as (host name, size, is directory), name-sorted.
    fn list_dir(&self) -> Vec<(String, u64, bool)> {
        let mut entries = Vec::new();
        let Ok(dir) = fs::read_dir(&self.root) else {
            return entries;
        };
        for entry in dir.flatten() {
            let Ok(meta) = entry.metadata() else { continue };
            entries.push((
                entry.file_name().to_string_lossy().into_owned(),
                meta.len(),
                meta.is_dir(),
            ));
        }
        entries.sort();
        entries
    }

    /// Resolve a plain filename under the root. Empty names, path
    /// separators, and wildcards have no host path.
    fn host_path(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('*')
            || name.contains('?')
            || name == ".."
        {
            return None;
        }
        Some(self.root.join(name))
    }

    /// Find an existing file, resolving `*`/`?` against the sorted
    /// directory (first match wins, like a real drive).
    fn resolve_existing(&self, pattern: &str) -> Option<PathBuf> {
        if pattern.contains('*') || pattern.contains('?') {
            let (name, _, _) = self
                .list_dir()
                .into_iter()
                .find(|(name, _, is_dir)| !is_dir && matches_pattern(pattern, name))?;
            Some(self.root.join(name))
        } else {
            let path = self.host_path(pattern)?;
            path.is_file().then_some(path)
        }
    }

    fn open_read(&mut self, request: &OpenRequest, channel: usize) -> u8 {
        let Some(path) = self.resolve_existing(&request.name) else {
            self.set_error(DosError::FileNotFound);
            return ST_ERROR;
        };
        match fs::read(&path) {
            Ok(data) => {
                self.channels[channel] = Some(Transfer::Read { data, pos: 0 });
                ST_OK
            }
            Err(err) => {
                log::warn!("read {} failed: {err}", path.display());
                self.set_error(DosError::FileNotFound);
                ST_ERROR
            }
        }
    }

    fn open_write(&mut self, request: &OpenRequest, channel: usize) -> u8 {
        let Some(path) = self.host_path(&request.name) else {
            self.set_error(DosError::InvalidFilename);
            return ST_ERROR;
        };
        if path.exists() && !request.overwrite {
            self.set_error(DosError::FileExists);
            return ST_ERROR;
        }
        self.channels[channel] = Some(Transfer::Write {
            path,
            data: Vec::new(),
        });
        ST_OK
    }

    fn open_append(&mut self, request: &OpenRequest, channel: usize) -> u8 {
        let Some(path) = self.resolve_existing(&request.name) else {
            self.set_error(DosError::FileNotFound);
            return ST_ERROR;
        };
        match fs::read(&path) {
            Ok(data) => {
                self.channels[channel] = Some(Transfer::Write { path, data });
                ST_OK
            }
            Err(err) => {
                log::warn!("append {} failed: {err}", path.display());
                self.set_error(DosError::FileNotFound);
                ST_ERROR
            }
        }
    }

    /// Fabricate the LOAD"$" listing for this directory.
    fn open_directory(&mut self, channel: usize) -> u8 {
        let entries: Vec<DirEntry> = self
            .list_dir()
            .into_iter()
            .map(|(name, size, is_dir)| DirEntry {
                name,
                size,
                file_type: if is_dir { "DIR" } else { "PRG" },
            })
            .collect();
        let title = self
            .root
            .file_name()
            .map_or_else(|| "fsdevice".to_string(), |n| {
                n.to_string_lossy().into_owned()
            });
        let listing = directory::build_listing(&title, &entries, BLOCKS_FREE);
        self.channels[channel] = Some(Transfer::Read {
            data: listing,
            pos: 0,
        });
        ST_OK
    }

    /// Flush a channel's transfer; writes hit the host file here.
    fn finish_channel(&mut self, channel: usize) -> u8 {
        match self.channels[channel].take() {
            Some(Transfer::Write { path, data }) => {
                if let Err(err) = fs::write(&path, &data) {
                    log::warn!("write {} failed: {err}", path.display());
                    self.set_error(DosError::WriteError);
                    return ST_ERROR;
                }
                ST_OK
            }
            _ => ST_OK,
        }
    }

    fn execute_command(&mut self, command: &str) {
        log::trace!("command {command:?}");
        let Some(first) = command.chars().next() else {
            return;
        };
        match first {
            // Initialize / validate: a directory needs neither.
            'i' | 'v' => self.set_error(DosError::Ok),
            'u' => {
                if command.starts_with("uj") || command.starts_with("u:") {
                    self.set_error(DosError::DosVersion);
                } else {
                    self.set_error(DosError::InvalidCommand);
                }
            }
            's' => self.scratch(command),
            'r' => self.rename(command),
            _ => self.set_error(DosError::InvalidCommand),
        }
    }

    /// S:pattern — delete matching files, report the count.
    fn scratch(&mut self, command: &str) {
        let Some((_, pattern)) = command.split_once(':') else {
            self.set_error(DosError::SyntaxError);
            return;
        };
        let mut count: u8 = 0;
        for (name, _, is_dir) in self.list_dir() {
            if is_dir || !matches_pattern(pattern, &name) {
                continue;
            }
            match fs::remove_file(self.root.join(&name)) {
                Ok(()) => count = count.saturating_add(1),
                Err(err) => log::warn!("scratch {name} failed: {err}"),
            }
        }
        self.set_error(DosError::FilesScratched(count));
    }

    /// R:new=old — rename a file.
    fn rename(&mut self, command: &str) {
        let Some((_, args)) = command.split_once(':') else {
            self.set_error(DosError::SyntaxError);
            return;
        };
        let Some((new, old)) = args.split_once('=') else {
            self.set_error(DosError::SyntaxError);
            return;
        };
        let (Some(new_path), Some(old_path)) = (self.host_path(new), self.host_path(old)) else {
            self.set_error(DosError::InvalidFilename);
            return;
        };
        if !old_path.is_file() {
            self.set_error(DosError::FileNotFound);
        } else if new_path.exists() {
            self.set_error(DosError::FileExists);
        } else if let Err(err) = fs::rename(&old_path, &new_path) {
            log::warn!("rename {old} -> {new} failed: {err}");
            self.set_error(DosError::WriteError);
        } else {
            self.set_error(DosError::Ok);
        }
    }
}

impl SerialDriver for FsDevice {
    fn open(&mut self, name: Option<&[u8]>, channel: usize) -> u8 {
        if channel == COMMAND_CHANNEL {
            if let Some(command) = name
                && !command.is_empty()
            {
                self.execute_command(&petscii::to_host(command));
            }
            return ST_OK;
        }
        let Some(name) = name else {
            // Bare OPEN CHANNEL: nothing to connect; any bytes the bus
            // replays into the channel are refused by put.
            return ST_OK;
        };
        if name.first() == Some(&b'$') {
            return self.open_directory(channel);
        }
        let request = parse_request(name, channel);
        match request.mode {
            AccessMode::Read => self.open_read(&request, channel),
            AccessMode::Write => self.open_write(&request, channel),
            AccessMode::Append => self.open_append(&request, channel),
        }
    }

    fn close(&mut self, channel: usize) -> u8 {
        if channel == COMMAND_CHANNEL {
            // Closing the command channel closes every data channel.
            let mut status = ST_OK;
            for ch in 0..MAX_CHANNELS {
                let st = self.finish_channel(ch);
                if st != ST_OK {
                    status = st;
                }
            }
            status
        } else {
            self.finish_channel(channel)
        }
    }

    fn put(&mut self, byte: u8, channel: usize) -> u8 {
        if channel == COMMAND_CHANNEL {
            self.command.push(byte);
            return ST_OK;
        }
        match self.channels[channel].as_mut() {
            Some(Transfer::Write { data, .. }) => {
                data.push(byte);
                ST_OK
            }
            _ => ST_ERROR,
        }
    }

    fn get(&mut self, channel: usize) -> (u8, u8) {
        if channel == COMMAND_CHANNEL {
            return self.status_byte();
        }
        match self.channels[channel].as_mut() {
            Some(Transfer::Read { data, pos }) => {
                if *pos >= data.len() {
                    return (0, ST_EOF);
                }
                let byte = data[*pos];
                *pos += 1;
                let status = if *pos >= data.len() { ST_EOF } else { ST_OK };
                (byte, status)
            }
            _ => (0, ST_EOF),
        }
    }

    fn flush(&mut self, channel: usize) {
        if channel == COMMAND_CHANNEL && !self.command.is_empty() {
            let mut command = std::mem::take(&mut self.command);
            if command.last() == Some(&0x0d) {
                command.pop();
            }
            self.execute_command(&petscii::to_host(&command));
        }
    }

    fn listen(&mut self, channel: usize) {
        // Nothing buffers on data channels; a pending command string on
        // channel 15 runs now.
        self.flush(channel);
    }
}

/// Split `NAME[,TYPE][,MODE]` and apply the channel conventions: channel
/// 0 always reads, channel 1 always writes.
fn parse_request(name: &[u8], channel: usize) -> OpenRequest {
    let text = petscii::to_host(name);
    let mut rest = text.as_str();

    let mut overwrite = false;
    if let Some(stripped) = rest.strip_prefix('@') {
        rest = stripped;
        overwrite = true;
    }
    // Drive-number prefixes mean nothing for a directory drive.
    for prefix in ["0:", "1:", ":"] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }

    let mut parts = rest.split(',');
    let file = parts.next().unwrap_or("").to_string();
    let mut mode = AccessMode::Read;
    for part in parts {
        match part {
            "r" => mode = AccessMode::Read,
            "w" => mode = AccessMode::Write,
            "a" => mode = AccessMode::Append,
            // File type letters (PRG/SEQ/USR) pick nothing on a host
            // directory.
            _ => {}
        }
    }
    match channel {
        0 => mode = AccessMode::Read,
        1 => mode = AccessMode::Write,
        _ => {}
    }

    OpenRequest {
        name: file,
        mode,
        overwrite,
    }
}

/// CBM wildcard match: `*` matches the whole rest of the name, `?` any
/// single character.
fn matches_pattern(pattern: &str, name: &str) -> bool {
    let mut pattern = pattern.chars();
    let mut name = name.chars();
    loop {
        match (pattern.next(), name.next()) {
            (Some('*'), _) => return true,
            (Some('?'), Some(_)) => {}
            (Some(p), Some(n)) if p == n => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(name: &[u8], channel: usize) -> OpenRequest {
        parse_request(name, channel)
    }

    #[test]
    fn plain_name_defaults_to_read() {
        let req = parsed(b"GAME", 2);
        assert_eq!(req.name, "game");
        assert_eq!(req.mode, AccessMode::Read);
        assert!(!req.overwrite);
    }

    #[test]
    fn type_and_mode_suffixes() {
        assert_eq!(parsed(b"DATA,S,W", 2).mode, AccessMode::Write);
        assert_eq!(parsed(b"DATA,S,A", 2).mode, AccessMode::Append);
        assert_eq!(parsed(b"DATA,P", 2).mode, AccessMode::Read);
    }

    #[test]
    fn channel_conventions_override_suffix() {
        assert_eq!(parsed(b"PROG,S,W", 0).mode, AccessMode::Read);
        assert_eq!(parsed(b"PROG", 1).mode, AccessMode::Write);
    }

    #[test]
    fn overwrite_and_drive_prefixes_strip() {
        let req = parsed(b"@0:FILE,S,W", 2);
        assert_eq!(req.name, "file");
        assert!(req.overwrite);
        assert_eq!(parsed(b"0:FILE", 2).name, "file");
        assert_eq!(parsed(b":FILE", 2).name, "file");
    }

    #[test]
    fn wildcard_matching() {
        assert!(matches_pattern("*", "anything"));
        assert!(matches_pattern("ga*", "game"));
        assert!(matches_pattern("game", "game"));
        assert!(matches_pattern("g?me", "game"));
        assert!(matches_pattern("game*", "game"));
        assert!(!matches_pattern("g?me", "gme"));
        assert!(!matches_pattern("game", "games"));
        assert!(!matches_pattern("games", "game"));
    }

    #[test]
    fn host_path_rejects_escapes() {
        let dev = FsDevice::new("/tmp/none");
        assert!(dev.host_path("ok").is_some());
        assert!(dev.host_path("").is_none());
        assert!(dev.host_path("a/b").is_none());
        assert!(dev.host_path("..").is_none());
        assert!(dev.host_path("wild*").is_none());
    }

    #[test]
    fn status_line_reads_to_eof_then_resets() {
        let mut dev = FsDevice::new("/tmp/none");
        dev.set_error(DosError::FileNotFound);

        let mut line = Vec::new();
        loop {
            let (byte, st) = dev.get(COMMAND_CHANNEL);
            line.push(byte);
            if st == ST_EOF {
                break;
            }
        }
        assert_eq!(line, b"62,FILE NOT FOUND,00,00\r".to_vec());
        assert_eq!(dev.last_error(), DosError::Ok);

        let (byte, _) = dev.get(COMMAND_CHANNEL);
        assert_eq!(byte, b'0'); // next read starts "00, OK..."
    }

    #[test]
    fn powers_up_with_dos_version() {
        let dev = FsDevice::new("/tmp/none");
        assert_eq!(dev.last_error(), DosError::DosVersion);
    }

    #[test]
    fn unknown_command_reports_invalid() {
        let mut dev = FsDevice::new("/tmp/none");
        dev.execute_command("x");
        assert_eq!(dev.last_error(), DosError::InvalidCommand);
    }

    #[test]
    fn initialize_clears_error() {
        let mut dev = FsDevice::new("/tmp/none");
        dev.execute_command("i");
        assert_eq!(dev.last_error(), DosError::Ok);
    }
}
