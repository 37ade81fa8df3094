use std::fmt;

/// Checkerboard/rack marker combination of one pixel line.
///
/// The first half names the left checkerboard square, the second half the
/// last rack square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    WhiteWhite,
    WhiteBlack,
    BlackWhite,
    BlackBlack,
}

impl Pattern {
    /// Classify a line from its checkerboard and rack sample columns.
    pub fn classify(line: &[u8], checkerboard: usize, rack: usize) -> Self {
        let at = |i: usize| line.get(i).copied().unwrap_or(0);
        let checkerboard_black = at(checkerboard) == 1
            || (checkerboard >= 2 && at(checkerboard - 1) == 1 && at(checkerboard - 2) == 1);
        let rack_black = at(rack) == 1;

        if checkerboard_black && !rack_black {
            Pattern::BlackWhite
        } else if at(checkerboard) == 0 && !rack_black {
            Pattern::WhiteWhite
        } else if at(checkerboard) == 0 && rack_black {
            Pattern::WhiteBlack
        } else {
            Pattern::BlackBlack
        }
    }
}

/// One binary pixel line tagged with its marker pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternLine {
    pub pattern: Pattern,
    pub pixels: Vec<u8>,
}

/// Pixel lines that make up one logical strip row, with their grayscale
/// counterparts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedRow {
    pub lines: Vec<PatternLine>,
    pub gray: Vec<Vec<u8>>,
}

impl GroupedRow {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Pattern of the first line, which drives rack handling in decoding.
    pub fn pattern(&self) -> Option<Pattern> {
        self.lines.first().map(|l| l.pattern)
    }

    /// Sub-group of lines `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> GroupedRow {
        GroupedRow {
            lines: self.lines[start..end].to_vec(),
            gray: self.gray[start..end].to_vec(),
        }
    }
}

/// Number of marker characters at each end of a row that carry no data.
pub const ROW_MARKER_WIDTH: usize = 7;

/// Decoded row: one `0`/`1` unit per bit position, markers included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DibitRow(Vec<u8>);

impl DibitRow {
    pub fn new(units: Vec<u8>) -> Self {
        Self(units)
    }

    /// Parse a row written as `0`/`1` characters.
    pub fn parse(text: &str) -> Option<Self> {
        text.chars()
            .map(|c| match c {
                '0' => Some(0),
                '1' => Some(1),
                _ => None,
            })
            .collect::<Option<Vec<u8>>>()
            .map(Self)
    }

    pub fn units(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Data bits between the leading and trailing markers.
    pub fn payload_bits(&self) -> Vec<u8> {
        if self.0.len() < 2 * ROW_MARKER_WIDTH {
            return Vec::new();
        }
        dibits_to_bits(&self.0[ROW_MARKER_WIDTH..self.0.len() - ROW_MARKER_WIDTH])
    }
}

impl fmt::Display for DibitRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for unit in &self.0 {
            write!(f, "{unit}")?;
        }
        Ok(())
    }
}

/// `10` decodes to 0, `01` to 1, anything else to 0.
pub fn dibit_to_bit(dibit: &[u8]) -> u8 {
    match dibit {
        [0, 1] => 1,
        _ => 0,
    }
}

/// Encode one bit as a dibit.
pub fn bit_to_dibit(bit: u8) -> [u8; 2] {
    if bit == 0 { [1, 0] } else { [0, 1] }
}

/// Convert a dibit sequence to bits; a trailing odd unit is ignored.
pub fn dibits_to_bits(units: &[u8]) -> Vec<u8> {
    units.chunks_exact(2).map(dibit_to_bit).collect()
}

/// Output of row decoding: every parity-valid reconstruction of one row,
/// the primary one first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRow {
    candidates: Vec<DibitRow>,
}

impl DecodedRow {
    /// Returns `None` when there is no candidate.
    pub fn new(candidates: Vec<DibitRow>) -> Option<Self> {
        if candidates.is_empty() {
            None
        } else {
            Some(Self { candidates })
        }
    }

    pub fn single(row: DibitRow) -> Self {
        Self {
            candidates: vec![row],
        }
    }

    pub fn primary(&self) -> &DibitRow {
        &self.candidates[0]
    }

    pub fn candidates(&self) -> &[DibitRow] {
        &self.candidates
    }

    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}
