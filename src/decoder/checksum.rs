//! Strip checksum: a one's-complement style sum folded through a 9-bit carry.

/// Checksum of the first `length - 1` bytes of `data`, the bytes that follow
/// the checksum field. Returns `None` if `data` is too short.
pub fn checksum(data: &[u8], length: usize) -> Option<u8> {
    let count = length.checked_sub(1)?;
    if count > data.len() {
        return None;
    }
    let c = data[..count].iter().fold(0u32, |c, &byte| {
        ((c & 0xff) + byte as u32 + (c >> 8)) & 0x1ff
    });
    Some((0x100 - ((c & 0xff) + (c >> 8))) as u8)
}

/// True when `declared` matches the checksum of `data`.
pub fn verify_checksum(declared: u8, data: &[u8], length: usize) -> bool {
    checksum(data, length) == Some(declared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_sum() {
        // 0x100 wraps to zero
        assert_eq!(checksum(&[], 1), Some(0));
    }

    #[test]
    fn test_carry_is_folded() {
        // 0xff + 0x02 = 0x101 -> 0x01 + 0x01 = 0x02
        assert_eq!(checksum(&[0xff, 0x02], 3), Some(0xfe));
        assert_eq!(checksum(&[0x48, 0x49], 3), Some(0x6f));
    }

    #[test]
    fn test_too_short_data() {
        assert_eq!(checksum(&[1, 2], 4), None);
        assert_eq!(checksum(&[1, 2], 0), None);
        assert!(!verify_checksum(0, &[1, 2], 4));
    }

    proptest! {
        #[test]
        fn prop_checksum_round_trip(data in prop::collection::vec(any::<u8>(), 0..300), extra in 0usize..8) {
            let length = data.len() + 1;
            let sum = checksum(&data, length).unwrap();
            prop_assert!(verify_checksum(sum, &data, length));
            // trailing bytes beyond the declared length are ignored
            let mut padded = data.clone();
            padded.extend(std::iter::repeat_n(0xAA, extra));
            prop_assert!(verify_checksum(sum, &padded, length));
        }
    }
}
