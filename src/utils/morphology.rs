//! Binary morphology on pixel lines (`1` = black, `0` = white).
//!
//! Kernels are anchored at their bottom-right cell, so a pixel looks at
//! itself and at neighbours above and to the left. Out-of-range neighbours
//! are ignored.

/// Grow black pixels downwards: a pixel becomes black when any of the
/// `reach` lines above it is black in the same column.
pub fn dilate_black_vertical(lines: &[Vec<u8>], reach: usize) -> Vec<Vec<u8>> {
    let mut out = lines.to_vec();
    for y in 0..lines.len() {
        let first = y.saturating_sub(reach);
        for x in 0..lines[y].len() {
            if lines[first..y]
                .iter()
                .any(|line| line.get(x).copied() == Some(1))
            {
                out[y][x] = 1;
            }
        }
    }
    out
}

fn dilate_2x2(lines: &[Vec<u8>], grow: u8) -> Vec<Vec<u8>> {
    let mut out = lines.to_vec();
    for y in 0..lines.len() {
        for x in 0..lines[y].len() {
            if lines[y][x] == grow {
                continue;
            }
            let left = x > 0 && lines[y][x - 1] == grow;
            let up = y > 0 && lines[y - 1].get(x).copied() == Some(grow);
            let diagonal = x > 0 && y > 0 && lines[y - 1].get(x - 1).copied() == Some(grow);
            if left || up || diagonal {
                out[y][x] = grow;
            }
        }
    }
    out
}

/// Dilate black regions with a 2x2 kernel.
pub fn dilate_black(lines: &[Vec<u8>], iterations: usize) -> Vec<Vec<u8>> {
    (0..iterations).fold(lines.to_vec(), |acc, _| dilate_2x2(&acc, 1))
}

/// Dilate white regions with a 2x2 kernel.
pub fn dilate_white(lines: &[Vec<u8>], iterations: usize) -> Vec<Vec<u8>> {
    (0..iterations).fold(lines.to_vec(), |acc, _| dilate_2x2(&acc, 0))
}

/// Noise repair for one grouped row: closes white speckles inside black
/// bars, then gives back one pixel of white.
pub fn repair_row(lines: &[Vec<u8>]) -> Vec<Vec<u8>> {
    dilate_white(&dilate_black(lines, 2), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_dilation_reaches_down() {
        let lines = vec![vec![1, 0], vec![0, 0], vec![0, 0], vec![0, 0], vec![0, 0]];
        let dilated = dilate_black_vertical(&lines, 3);
        assert_eq!(dilated[1], vec![1, 0]);
        assert_eq!(dilated[3], vec![1, 0]);
        assert_eq!(dilated[4], vec![0, 0]);
    }

    #[test]
    fn test_repair_fills_single_white_gap() {
        let lines = vec![vec![0, 1, 1, 1, 0, 1, 1, 1, 0, 0, 0, 0]; 3];
        let repaired = repair_row(&lines);
        // the gap at column 4 is closed
        assert_eq!(repaired[1][4], 1);
        assert_eq!(repaired[1][5], 1);
        // wide white areas survive
        assert_eq!(repaired[1][11], 0);
    }

    #[test]
    fn test_dilate_white_shrinks_black() {
        let lines = vec![vec![0, 1, 1, 1, 0]];
        assert_eq!(dilate_white(&lines, 1), vec![vec![0, 0, 1, 1, 0]]);
    }
}
