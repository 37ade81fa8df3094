//! Row parity.
//!
//! A row carries two parity dibits: the left one covers the payload bits at
//! odd positions, the right one the payload bits at even positions.

use crate::models::row::{ROW_MARKER_WIDTH, bit_to_dibit, dibit_to_bit, dibits_to_bits};
use crate::models::{DibitRow, Pattern};

/// Units of the left markers before the parity dibit.
const LEFT_MARKER_WIDTH: usize = ROW_MARKER_WIDTH - 2;
/// Units of the right markers after the parity dibit.
const RIGHT_MARKER_WIDTH: usize = ROW_MARKER_WIDTH - 2;

/// Left and right parity bits of a payload.
pub fn calculate_parity(payload: &[u8]) -> (u8, u8) {
    let odd = payload.iter().skip(1).step_by(2).sum::<u8>() % 2;
    let even = payload.iter().step_by(2).sum::<u8>() % 2;
    (odd, even)
}

fn well_formed(units: &[u8]) -> bool {
    units.chunks(2).all(|d| matches!(d, [1, 0] | [0, 1]))
}

/// True when both parity dibits match the payload and every parity and data
/// dibit is well formed.
pub fn parity_check(row: &DibitRow) -> bool {
    let units = row.units();
    let n = units.len();
    if n < 2 * ROW_MARKER_WIDTH {
        return false;
    }
    let coded = &units[LEFT_MARKER_WIDTH..n - RIGHT_MARKER_WIDTH];
    if coded.len() % 2 != 0 || !well_formed(coded) {
        return false;
    }
    let payload = dibits_to_bits(&units[ROW_MARKER_WIDTH..n - ROW_MARKER_WIDTH]);
    let (left, right) = calculate_parity(&payload);
    left == dibit_to_bit(&units[LEFT_MARKER_WIDTH..ROW_MARKER_WIDTH])
        && right == dibit_to_bit(&units[n - ROW_MARKER_WIDTH..n - RIGHT_MARKER_WIDTH])
}

/// Length and parity validation of a decoded row.
pub fn is_valid_row(row: &DibitRow, bits_per_row: usize) -> bool {
    row.len() == bits_per_row && parity_check(row)
}

/// Lay out `payload` as a complete row: start bar, checkerboard, parity
/// dibits and rack. Black-white rows open the checkerboard with black and end
/// the rack with white; white-black rows do the opposite.
pub fn assemble_row(payload: &[u8], pattern: Pattern) -> DibitRow {
    let black_first = pattern != Pattern::WhiteBlack;
    let (left, right) = calculate_parity(payload);
    let mut units = vec![1, 1, 0];
    units.extend(if black_first { [1, 0] } else { [0, 1] });
    units.extend(bit_to_dibit(left));
    for &bit in payload {
        units.extend(bit_to_dibit(bit));
    }
    units.extend(bit_to_dibit(right));
    units.extend([0, 0, 1, 1]);
    units.push(u8::from(!black_first));
    DibitRow::new(units)
}
