use std::fmt;

use crate::error::{Result, SoftstripError};

/// Metadata only present in the first strip of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstStripInfo {
    pub os_type: u8,
    pub num_files: u8,
    pub cauzin_type: u8,
    pub os_filetype: u8,
    pub file_length: u32,
    pub filename: String,
}

/// Parsed strip header. Built through [`FileHeaderBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Declared length, counted from the checksum byte to the end of the payload.
    pub length: u32,
    pub checksum: u8,
    pub strip_id: String,
    pub seq_no: u8,
    pub strip_type: u8,
    pub first_strip: Option<FirstStripInfo>,
}

/// Bytes of the declared length that are not payload in every strip:
/// checksum, strip id, sequence number, strip type, software expansion.
pub const BASE_OVERHEAD: usize = 11;

/// Additional non-payload bytes of the first strip, excluding the filename.
pub const FIRST_STRIP_OVERHEAD: usize = 9;

impl FileHeader {
    pub fn is_first_strip(&self) -> bool {
        self.first_strip.is_some()
    }

    pub fn filename(&self) -> Option<&str> {
        self.first_strip.as_ref().map(|f| f.filename.as_str())
    }

    /// Payload bytes implied by the declared length.
    pub fn payload_length(&self) -> usize {
        let mut overhead = BASE_OVERHEAD;
        if let Some(first) = &self.first_strip {
            // one strip byte per filename character
            overhead += FIRST_STRIP_OVERHEAD + first.filename.chars().count();
        }
        (self.length as usize).saturating_sub(overhead)
    }
}

impl fmt::Display for FileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Strip id: {}", self.strip_id)?;
        writeln!(f, " Sequence number: {}", self.seq_no)?;
        writeln!(f, " Strip type: {}", strip_type_name(self.strip_type))?;
        write!(f, " Length: {}", self.length)?;
        if let Some(first) = &self.first_strip {
            writeln!(f)?;
            writeln!(f, " Filename: {}", first.filename)?;
            writeln!(f, " Os type: {}", os_type_name(first.os_type))?;
            writeln!(f, " Number of files: {}", first.num_files)?;
            writeln!(f, " Cauzin file type: {}", cauzin_file_type_name(first.cauzin_type))?;
            writeln!(
                f,
                " Os file type: {}",
                os_file_type_name(first.os_type, first.os_filetype)
            )?;
            write!(f, " File length: {}", first.file_length)?;
        }
        Ok(())
    }
}

/// Incremental assembly of a [`FileHeader`] while fields are read off the
/// byte stream.
#[derive(Debug, Default, Clone)]
pub struct FileHeaderBuilder {
    length: Option<u32>,
    checksum: Option<u8>,
    strip_id: Option<String>,
    seq_no: Option<u8>,
    strip_type: Option<u8>,
    os_type: Option<u8>,
    num_files: Option<u8>,
    cauzin_type: Option<u8>,
    os_filetype: Option<u8>,
    file_length: Option<u32>,
    filename: Option<String>,
}

impl FileHeaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn checksum(mut self, checksum: u8) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// Strip id bytes, read as 8-bit characters.
    pub fn strip_id(mut self, bytes: &[u8]) -> Self {
        self.strip_id = Some(bytes.iter().map(|&b| b as char).collect());
        self
    }

    pub fn seq_no(mut self, seq_no: u8) -> Self {
        self.seq_no = Some(seq_no);
        self
    }

    pub fn strip_type(mut self, strip_type: u8) -> Self {
        self.strip_type = Some(strip_type);
        self
    }

    pub fn os_type(mut self, os_type: u8) -> Self {
        self.os_type = Some(os_type);
        self
    }

    pub fn num_files(mut self, num_files: u8) -> Self {
        self.num_files = Some(num_files);
        self
    }

    pub fn cauzin_type(mut self, cauzin_type: u8) -> Self {
        self.cauzin_type = Some(cauzin_type);
        self
    }

    pub fn os_filetype(mut self, os_filetype: u8) -> Self {
        self.os_filetype = Some(os_filetype);
        self
    }

    pub fn file_length(mut self, file_length: u32) -> Self {
        self.file_length = Some(file_length);
        self
    }

    pub fn filename(mut self, bytes: &[u8]) -> Self {
        self.filename = Some(bytes.iter().map(|&b| b as char).collect());
        self
    }

    /// Assemble the header. First-strip fields are required when
    /// `first_strip` is set.
    pub fn build(self, first_strip: bool) -> Result<FileHeader> {
        let first = if first_strip {
            Some(FirstStripInfo {
                os_type: self.os_type.ok_or(SoftstripError::MissingField("os_type"))?,
                num_files: self.num_files.ok_or(SoftstripError::MissingField("num_files"))?,
                cauzin_type: self
                    .cauzin_type
                    .ok_or(SoftstripError::MissingField("cauzin_type"))?,
                os_filetype: self
                    .os_filetype
                    .ok_or(SoftstripError::MissingField("os_filetype"))?,
                file_length: self
                    .file_length
                    .ok_or(SoftstripError::MissingField("file_length"))?,
                filename: self.filename.ok_or(SoftstripError::MissingField("filename"))?,
            })
        } else {
            None
        };

        Ok(FileHeader {
            length: self.length.ok_or(SoftstripError::MissingField("length"))?,
            checksum: self.checksum.ok_or(SoftstripError::MissingField("checksum"))?,
            strip_id: self.strip_id.ok_or(SoftstripError::MissingField("strip_id"))?,
            seq_no: self.seq_no.ok_or(SoftstripError::MissingField("seq_no"))?,
            strip_type: self
                .strip_type
                .ok_or(SoftstripError::MissingField("strip_type"))?,
            first_strip: first,
        })
    }
}

pub fn strip_type_name(strip_type: u8) -> String {
    match strip_type {
        0x00 => "Standard Softstrip data strip".to_string(),
        0x01 => "Special key strip (undefined)".to_string(),
        _ => "Other formats (undefined)".to_string(),
    }
}

pub fn os_type_name(os: u8) -> String {
    let name = match os {
        0x00 => "Cauzin generic strip format",
        0x01 => "COLOS",
        0x10 => "Apple DOS 3.3",
        0x11 => "Apple ProDOS",
        0x12 => "Apple CP/M 2.0",
        0x14 => "PC/MS-DOS (2.1)",
        0x15 => "Macintosh MacBinary",
        0x20 => "Reserved - PC/MS-DOS",
        _ => return format!("Invalid OS type: {os:#x}"),
    };
    name.to_string()
}

pub fn cauzin_file_type_name(filetype: u8) -> String {
    let name = match filetype {
        0x00 => "Other / Unknown / Don't care",
        0x01 => "Text file",
        0x02 => "Binary executable or object code",
        0x04 => "Tokenized BASIC",
        0x10 => "Compressed with proprietary cauzin algorithm",
        _ => return format!("Invalid cauzin file type: {filetype:#x}"),
    };
    name.to_string()
}

pub fn os_file_type_name(os: u8, filetype: u8) -> String {
    let name = match (os, filetype) {
        (0x00 | 0x01, _) => "Unknown",
        // Apple DOS 3.3
        (0x10, 0x00) => "Text file",
        (0x10, 0x01) => "Integer BASIC file",
        (0x10, 0x02) => "Applesoft BASIC file",
        (0x10, 0x04) => "Binary file",
        (0x10, 0x10) => "Relocatable object module file",
        (0x10, 0x20) => "'A' type file, unsupported",
        (0x10, 0x40) => "'B' type file, unsupported",
        // Apple ProDOS
        (0x11, 0x04) => "ASCII text file",
        (0x11, 0x06) => "Binary file",
        (0x11, 0xfa) => "Integer BASIC file",
        (0x11, 0xfc) => "Applesoft BASIC file",
        (0x11, 0xfe) => "Relocatable object module file",
        (0x11, 0xff) => "System file",
        // PC-DOS/MS-DOS
        (0x14, 0x00) => "Executable DOS file",
        (0x14, 0x01) => "Other DOS file",
        // Macintosh
        (0x15, 0x00) => "MacBinary",
        (0x15, 0x01) => "Data fork, non-MacBinary",
        (0x10 | 0x11 | 0x14 | 0x15, _) => {
            return format!("Invalid OS file type: {filetype:#x}");
        }
        _ => return format!("Invalid OS type: {os:#x}"),
    };
    name.to_string()
}
