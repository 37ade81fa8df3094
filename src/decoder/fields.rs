//! File field extraction.
//!
//! Decoded rows are turned into bits, the vertical sync section is skipped up
//! to the first three zero bytes, and the file header fields are read off the
//! remaining bytes. When the checksum does not match and some rows had more
//! than one valid decoding, every combination of alternatives is tried.

use itertools::Itertools;
use log::{debug, info, warn};

use crate::config::WireOrder;
use crate::decoder::checksum::checksum;
use crate::error::{Result, SoftstripError};
use crate::models::{DecodedRow, DibitRow, FileHeader, FileHeaderBuilder};
use crate::utils::deadline::Deadline;

/// Zero bytes marking the transition from vertical sync to data.
const DATA_SYNC_ZEROS: usize = 3;

/// Parsed content of one strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripData {
    pub header: FileHeader,
    pub payload: Vec<u8>,
    pub checksum_valid: bool,
    /// Checksum computed over the bytes following the checksum field.
    pub computed_checksum: Option<u8>,
}

/// Sequential reader over the strip bytes.
struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, count: usize, field: &'static str) -> Result<&'a [u8]> {
        let end = self.pos + count;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(SoftstripError::TruncatedFields { field })?;
        self.pos = end;
        Ok(bytes)
    }

    fn byte(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    /// Bytes up to, not including, the first `0x00` or `0xFF`.
    fn terminated(&mut self, field: &'static str) -> Result<&'a [u8]> {
        let rest = &self.data[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == 0x00 || b == 0xFF)
            .ok_or(SoftstripError::TruncatedFields { field })?;
        self.take(len, field)
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

/// Reads file fields from decoded rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldExtractor {
    order: WireOrder,
}

impl FieldExtractor {
    pub fn new(order: WireOrder) -> Self {
        Self { order }
    }

    /// Pack bits into bytes. Outside the data section a trailing partial
    /// byte is dropped.
    fn pack(&self, bits: &[u8]) -> Vec<u8> {
        bits.chunks_exact(8).map(|b| self.order.pack(b)).collect()
    }

    /// Index of the row where the data section starts: the row holding the
    /// first of three consecutive zero bytes.
    fn data_start(&self, rows: &[&DibitRow]) -> Option<usize> {
        let mut zeros = 0;
        let mut run_start = 0;
        for (index, row) in rows.iter().enumerate() {
            for byte in self.pack(&row.payload_bits()) {
                if byte != 0 {
                    zeros = 0;
                    continue;
                }
                if zeros == 0 {
                    run_start = index;
                }
                zeros += 1;
                if zeros == DATA_SYNC_ZEROS {
                    return Some(run_start);
                }
            }
        }
        None
    }

    /// Bytes of the data section, starting at the data sync byte.
    fn data_bytes(&self, rows: &[&DibitRow]) -> Result<(usize, Vec<u8>)> {
        let start = self
            .data_start(rows)
            .ok_or(SoftstripError::DataSyncNotFound)?;
        let mut bits: Vec<u8> = rows[start..].iter().flat_map(|r| r.payload_bits()).collect();
        bits.resize(bits.len().next_multiple_of(8), 0);
        let bytes = self.pack(&bits);
        let sync = bytes
            .windows(DATA_SYNC_ZEROS)
            .position(|w| w.iter().all(|&b| b == 0))
            .ok_or(SoftstripError::DataSyncNotFound)?;
        Ok((start, bytes[sync..].to_vec()))
    }

    fn parse(&self, data: &[u8], first_strip: bool) -> Result<StripData> {
        let mut cursor = ByteCursor::new(data);
        cursor.take(1, "data_sync")?;
        cursor.take(2, "expansion")?;
        let length = self.order.parse_multi_byte(cursor.take(2, "length")?);
        let declared = cursor.byte("checksum")?;
        let computed = checksum(cursor.rest(), length as usize);

        let mut builder = FileHeaderBuilder::new()
            .length(length)
            .checksum(declared)
            .strip_id(cursor.take(6, "strip_id")?)
            .seq_no(cursor.byte("seq_no")?)
            .strip_type(cursor.byte("strip_type")?);
        cursor.take(2, "software_expansion")?;
        if first_strip {
            builder = builder
                .os_type(cursor.byte("os_type")?)
                .num_files(cursor.byte("num_files")?)
                .cauzin_type(cursor.byte("cauzin_type")?)
                .os_filetype(cursor.byte("os_filetype")?)
                .file_length(self.order.parse_multi_byte(cursor.take(3, "file_length")?))
                .filename(cursor.terminated("filename")?);
            cursor.take(1, "terminator")?;
            cursor.take(1, "block_expand")?;
        }
        let header = builder.build(first_strip)?;

        let rest = cursor.rest();
        let payload = rest[..header.payload_length().min(rest.len())].to_vec();
        Ok(StripData {
            header,
            payload,
            checksum_valid: computed == Some(declared),
            computed_checksum: computed,
        })
    }

    fn extract_rows(&self, rows: &[&DibitRow], first_strip: bool) -> Result<(usize, StripData)> {
        let (start, data) = self.data_bytes(rows)?;
        Ok((start, self.parse(&data, first_strip)?))
    }

    /// Extract the strip fields. Ambiguous rows of the data section are
    /// substituted combinatorially until the checksum matches; the primary
    /// decoding is returned unvalidated if none does.
    pub fn extract(
        &self,
        rows: &[DecodedRow],
        first_strip: bool,
        deadline: &Deadline,
    ) -> Result<StripData> {
        let primary: Vec<&DibitRow> = rows.iter().map(DecodedRow::primary).collect();
        let (start, strip) = self.extract_rows(&primary, first_strip)?;
        if strip.checksum_valid {
            debug!("checksum {:#04x} valid", strip.header.checksum);
            return Ok(strip);
        }

        let ambiguous: Vec<usize> = (start..rows.len())
            .filter(|&i| rows[i].is_ambiguous())
            .collect();
        if ambiguous.is_empty() {
            warn!(
                "checksum mismatch: declared {:#04x}, computed {:?}",
                strip.header.checksum, strip.computed_checksum
            );
            return Ok(strip);
        }

        info!("backtracking over {} ambiguous rows", ambiguous.len());
        let combinations = ambiguous
            .iter()
            .map(|&i| rows[i].candidates().iter())
            .multi_cartesian_product()
            .skip(1);
        for (tried, combination) in combinations.enumerate() {
            deadline.check()?;
            let mut candidate = primary.clone();
            for (&index, &row) in ambiguous.iter().zip(&combination) {
                candidate[index] = row;
            }
            if let Ok((_, found)) = self.extract_rows(&candidate, first_strip) {
                if found.checksum_valid {
                    info!("checksum valid after {} alternative combinations", tried + 1);
                    return Ok(found);
                }
            }
        }

        warn!(
            "no row combination satisfies checksum {:#04x}",
            strip.header.checksum
        );
        Ok(strip)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::decoder::parity::assemble_row;
    use crate::models::Pattern;
    use crate::tools::synth::{StripContent, StripLayout, strip_rows};

    fn decoded(rows: Vec<DibitRow>) -> Vec<DecodedRow> {
        rows.into_iter().map(DecodedRow::single).collect()
    }

    fn hi_rows(order: WireOrder) -> Vec<DibitRow> {
        let bytes = StripContent::single_file("hi.txt", b"HI").encode(order);
        strip_rows(&bytes, &StripLayout::default(), order)
    }

    #[test]
    fn test_extract_first_strip() {
        let rows = decoded(hi_rows(WireOrder::MsbFirst));
        let strip = FieldExtractor::default()
            .extract(&rows, true, &Deadline::unbounded())
            .unwrap();
        assert!(strip.checksum_valid);
        assert_eq!(strip.payload, b"HI");
        assert_eq!(strip.header.filename(), Some("hi.txt"));
        assert_eq!(strip.header.strip_id, "SYNTH0");
        assert_eq!(strip.header.first_strip.as_ref().unwrap().file_length, 2);
    }

    #[test]
    fn test_lsb_first_order() {
        let rows = decoded(hi_rows(WireOrder::LsbFirst));
        let strip = FieldExtractor::new(WireOrder::LsbFirst)
            .extract(&rows, true, &Deadline::unbounded())
            .unwrap();
        assert!(strip.checksum_valid);
        assert_eq!(strip.header.length, 28);
        assert_eq!(strip.payload, b"HI");
    }

    #[test]
    fn test_following_strip_has_no_filename() {
        let content = StripContent {
            strip_id: "SYNTH0".to_string(),
            seq_no: 2,
            strip_type: 0,
            first_strip: None,
            payload: vec![7, 8, 9],
        };
        let bytes = content.encode(WireOrder::MsbFirst);
        let rows = decoded(strip_rows(&bytes, &StripLayout::default(), WireOrder::MsbFirst));
        let strip = FieldExtractor::default()
            .extract(&rows, false, &Deadline::unbounded())
            .unwrap();
        assert!(strip.checksum_valid);
        assert_eq!(strip.header.seq_no, 2);
        assert_eq!(strip.payload, vec![7, 8, 9]);
    }

    #[test]
    fn test_high_byte_filename_keeps_full_payload() {
        let content = StripContent::single_file("\u{e9}b", b"HELLO");
        let bytes = content.encode(WireOrder::MsbFirst);
        assert!(bytes.contains(&0xE9));
        let rows = decoded(strip_rows(&bytes, &StripLayout::default(), WireOrder::MsbFirst));
        let strip = FieldExtractor::default()
            .extract(&rows, true, &Deadline::unbounded())
            .unwrap();
        assert!(strip.checksum_valid);
        assert_eq!(strip.header.filename(), Some("\u{e9}b"));
        assert_eq!(strip.payload, b"HELLO");
    }

    #[test]
    fn test_missing_data_sync() {
        let rows = decoded(vec![assemble_row(&[1; 16], Pattern::BlackWhite); 4]);
        let result = FieldExtractor::default().extract(&rows, true, &Deadline::unbounded());
        assert!(matches!(result, Err(SoftstripError::DataSyncNotFound)));
    }

    #[test]
    fn test_truncated_header() {
        // sync and half a length field
        let rows = decoded(strip_rows(&[0, 0, 0, 0], &StripLayout::default(), WireOrder::MsbFirst));
        let result = FieldExtractor::default().extract(&rows, false, &Deadline::unbounded());
        assert!(matches!(result, Err(SoftstripError::TruncatedFields { .. })));
    }

    /// Replace the last data row by an ambiguous row whose primary decoding
    /// is wrong.
    fn corrupt_last_row(rows: &mut [DecodedRow]) {
        let last = rows.len() - 1;
        let right = rows[last].primary().clone();
        let mut bits = right.payload_bits();
        bits[0] ^= 1;
        let wrong = assemble_row(&bits, Pattern::BlackWhite);
        rows[last] = DecodedRow::new(vec![wrong, right]).unwrap();
    }

    #[test]
    fn test_backtracking_finds_valid_combination() {
        let mut rows = decoded(hi_rows(WireOrder::MsbFirst));
        corrupt_last_row(&mut rows);
        let strip = FieldExtractor::default()
            .extract(&rows, true, &Deadline::unbounded())
            .unwrap();
        assert!(strip.checksum_valid);
        assert_eq!(strip.payload, b"HI");
    }

    #[test]
    fn test_exhausted_backtracking_keeps_primary() {
        let mut rows = decoded(hi_rows(WireOrder::MsbFirst));
        corrupt_last_row(&mut rows);
        let last = rows.len() - 1;
        let wrong = rows[last].primary().clone();
        rows[last] = DecodedRow::new(vec![wrong.clone(), wrong]).unwrap();
        let strip = FieldExtractor::default()
            .extract(&rows, true, &Deadline::unbounded())
            .unwrap();
        assert!(!strip.checksum_valid);
        assert_ne!(strip.payload, b"HI");
    }

    #[test]
    fn test_backtracking_respects_deadline() {
        let mut rows = decoded(hi_rows(WireOrder::MsbFirst));
        corrupt_last_row(&mut rows);
        let deadline = Deadline::start(Some(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(2));
        let result = FieldExtractor::default().extract(&rows, true, &deadline);
        assert!(matches!(result, Err(SoftstripError::Timeout { .. })));
    }
}
