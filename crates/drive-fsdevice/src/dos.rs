//! CBM DOS error channel state.
//!
//! The drive remembers its last error and reports it as a text line on
//! channel 15: `EC,MESSAGE,TT,SS` followed by carriage return. Reading
//! the line to the end clears the error back to `00, OK,00,00`.

/// DOS errors this drive can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DosError {
    /// 00, OK
    #[default]
    Ok,
    /// 01, FILES SCRATCHED (track field carries the count).
    FilesScratched(u8),
    /// 25, WRITE ERROR
    WriteError,
    /// 30, SYNTAX ERROR (malformed command)
    SyntaxError,
    /// 31, INVALID COMMAND
    InvalidCommand,
    /// 33, SYNTAX ERROR (invalid filename, e.g. wildcard on write)
    InvalidFilename,
    /// 62, FILE NOT FOUND
    FileNotFound,
    /// 63, FILE EXISTS
    FileExists,
    /// 73, power-on / reset DOS version message
    DosVersion,
}

impl DosError {
    /// Two-digit DOS error code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            DosError::Ok => 0,
            DosError::FilesScratched(_) => 1,
            DosError::WriteError => 25,
            DosError::SyntaxError => 30,
            DosError::InvalidCommand => 31,
            DosError::InvalidFilename => 33,
            DosError::FileNotFound => 62,
            DosError::FileExists => 63,
            DosError::DosVersion => 73,
        }
    }

    /// Message text as it appears between the commas.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            DosError::Ok => " OK",
            DosError::FilesScratched(_) => "FILES SCRATCHED",
            DosError::WriteError => "WRITE ERROR",
            DosError::SyntaxError => "SYNTAX ERROR",
            DosError::InvalidCommand => "INVALID COMMAND",
            DosError::InvalidFilename => "SYNTAX ERROR",
            DosError::FileNotFound => "FILE NOT FOUND",
            DosError::FileExists => "FILE EXISTS",
            DosError::DosVersion => "CBM DOS V2.6 1541",
        }
    }

    /// Render the full status line, carriage return included.
    ///
    /// Uppercase ASCII coincides with unshifted PETSCII, so the returned
    /// bytes go to the guest unconverted.
    #[must_use]
    pub fn status_line(self) -> Vec<u8> {
        let track = match self {
            DosError::FilesScratched(count) => count,
            _ => 0,
        };
        format!("{:02},{},{:02},{:02}\r", self.code(), self.message(), track, 0).into_bytes()
    }
}
