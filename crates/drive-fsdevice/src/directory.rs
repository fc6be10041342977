//! Synthetic directory listings.
//!
//! LOAD"$" on a real drive does not return a file: the drive fabricates a
//! BASIC program on the fly. Load address $0401, then one BASIC line per
//! entry where the line number is the block count and the line text is
//! the quoted filename plus type. The link pointers chain normally and
//! the program ends with a $0000 link.

use crate::petscii;

/// Load address of a fabricated directory listing.
pub const DIR_LOAD_ADDRESS: u16 = 0x0401;

/// Block size used to convert host byte sizes to CBM blocks.
const BLOCK_SIZE: u64 = 254;

/// One listing entry.
pub struct DirEntry {
    /// Host filename (listed uppercase, truncated to 16 characters).
    pub name: String,
    /// Host size in bytes.
    pub size: u64,
    /// Type column: "PRG" for files, "DIR" for subdirectories.
    pub file_type: &'static str,
}

impl DirEntry {
    /// CBM block count shown as the BASIC line number.
    #[must_use]
    pub fn blocks(&self) -> u16 {
        u16::try_from(self.size.div_ceil(BLOCK_SIZE)).unwrap_or(u16::MAX)
    }
}

/// Append one BASIC line (link, line number, text, terminator).
fn push_line(out: &mut Vec<u8>, addr: &mut u16, line_number: u16, text: &[u8]) {
    let next = addr.wrapping_add(4).wrapping_add(text.len() as u16).wrapping_add(1);
    out.extend_from_slice(&next.to_le_bytes());
    out.extend_from_slice(&line_number.to_le_bytes());
    out.extend_from_slice(text);
    out.push(0);
    *addr = next;
}

/// Build the listing program for a directory.
///
/// `title` is the disk-name header (reverse video on the guest screen);
/// `blocks_free` fills the familiar closing line.
#[must_use]
pub fn build_listing(title: &str, entries: &[DirEntry], blocks_free: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&DIR_LOAD_ADDRESS.to_le_bytes());
    let mut addr = DIR_LOAD_ADDRESS;

    // Header: reverse-video quoted disk name padded to 16, then an ID
    // field like a freshly formatted disk.
    let mut header = vec![0x12, b'"'];
    let mut name = petscii::to_petscii(title);
    name.truncate(16);
    name.resize(16, b' ');
    header.extend_from_slice(&name);
    header.extend_from_slice(b"\" 00 2A");
    push_line(&mut out, &mut addr, 0, &header);

    for entry in entries {
        let blocks = entry.blocks();
        // Pad so the quoted names line up regardless of digit count.
        let pad = match blocks {
            0..=9 => 3,
            10..=99 => 2,
            100..=999 => 1,
            _ => 0,
        };
        let mut text = vec![b' '; pad];
        text.push(b'"');
        let mut name = petscii::to_petscii(&entry.name);
        name.truncate(16);
        text.extend_from_slice(&name);
        text.push(b'"');
        text.extend(std::iter::repeat_n(b' ', 17 - name.len()));
        text.extend_from_slice(entry.file_type.as_bytes());
        push_line(&mut out, &mut addr, blocks, &text);
    }

    push_line(&mut out, &mut addr, blocks_free, b"BLOCKS FREE.");
    out.extend_from_slice(&[0, 0]);
    out
}
