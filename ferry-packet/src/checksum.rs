//! Checksum calculations for network packets
//!
//! This module provides the Internet Checksum (RFC 1071) used in the IPv4
//! header and, together with a pseudo-header prefix, in UDP.

/// Adds `data` to a running one's-complement sum.
///
/// Words are read big-endian; a trailing odd byte is the high byte of a
/// zero-padded word. The returned sum is not folded; a `u64` holds the sum of
/// 2^48 words, far beyond any buffer.
pub fn accumulate(mut sum: u64, data: &[u8]) -> u64 {
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u64;
    }

    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u64) << 8;
    }

    sum
}

/// Folds carries out of bit 16 back into the low 16 bits.
pub fn fold(mut sum: u64) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

/// Calculates the Internet Checksum as defined in RFC 1071.
///
/// # Examples
///
/// ```
/// use ferry_packet::checksum::internet_checksum;
///
/// let header = [0x45, 0x00, 0x00, 0x1c];
/// let checksum = internet_checksum(&header);
/// assert_eq!(checksum, !(0x4500u16 + 0x001c));
/// ```
pub fn internet_checksum(data: &[u8]) -> u16 {
    !fold(accumulate(0, data))
}

/// Calculates the Internet Checksum over `prefix || data` without
/// concatenating the two.
///
/// `prefix` must have even length (pseudo-headers always do), otherwise the
/// word alignment of `data` would shift.
pub fn checksum_with_prefix(prefix: &[u8], data: &[u8]) -> u16 {
    debug_assert!(prefix.len() % 2 == 0);
    let sum = accumulate(0, prefix);
    !fold(accumulate(sum, data))
}

/// Validates an Internet checksum.
///
/// Summing the data including its checksum field yields zero when the
/// checksum is correct.
pub fn validate_checksum(data: &[u8]) -> bool {
    internet_checksum(data) == 0
}

/// Writes `checksum` big-endian into `buf[offset..offset + 2]`.
pub(crate) fn splice(buf: &mut [u8], offset: usize, checksum: u16) {
    buf[offset..offset + 2].copy_from_slice(&checksum.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internet_checksum_empty() {
        assert_eq!(internet_checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_internet_checksum_rfc1071() {
        // RFC 1071 section 3 example: sum is 0xddf2
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(fold(accumulate(0, &data)), 0xddf2);
        assert_eq!(internet_checksum(&data), !0xddf2);
    }

    #[test]
    fn test_internet_checksum_odd_length() {
        // The trailing byte is the high half of a padded word
        let odd = [0x12, 0x34, 0x56];
        let padded = [0x12, 0x34, 0x56, 0x00];
        assert_eq!(internet_checksum(&odd), internet_checksum(&padded));
    }

    #[test]
    fn test_internet_checksum_carry_fold() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x02];
        // 0xffff + 0xffff + 0x0002 = 0x20000 -> 0x0002
        assert_eq!(fold(accumulate(0, &data)), 0x0002);
        assert_eq!(internet_checksum(&data), 0xFFFD);
    }

    #[test]
    fn test_internet_checksum_large_span() {
        // Folding after every word never leaves 16 bits
        fn reference(data: &[u8]) -> u16 {
            let mut sum: u16 = 0;
            for chunk in data.chunks(2) {
                let word = u16::from_be_bytes([chunk[0], *chunk.get(1).unwrap_or(&0)]);
                let (total, carry) = sum.overflowing_add(word);
                sum = total + carry as u16;
            }
            !sum
        }

        let ones = vec![0xFF; 140_000];
        assert_eq!(internet_checksum(&ones), reference(&ones));
        assert_eq!(internet_checksum(&ones), 0);

        let mixed: Vec<u8> = (0..200_001u32).map(|i| (i * 7 + 3) as u8).collect();
        assert_eq!(internet_checksum(&mixed), reference(&mixed));
    }

    #[test]
    fn test_known_ipv4_header() {
        // Classic example header with checksum 0xb861
        let mut header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        let checksum = internet_checksum(&header);
        assert_eq!(checksum, 0xb861);

        splice(&mut header, 10, checksum);
        assert!(validate_checksum(&header));
    }

    #[test]
    fn test_checksum_with_prefix_matches_concat() {
        let prefix = [0x7f, 0x00, 0x00, 0x01, 0x7f, 0x00, 0x00, 0x01, 0x00, 0x11, 0x00, 0x09];
        let data = [0x00, 0x35, 0x00, 0x35, 0x00, 0x09, 0x00, 0x00, 0xab];

        let mut joined = prefix.to_vec();
        joined.extend_from_slice(&data);

        assert_eq!(checksum_with_prefix(&prefix, &data), internet_checksum(&joined));
    }

    #[test]
    fn test_checksum_complement_identity() {
        let data = vec![0x12, 0x34, 0x56, 0x78];
        let checksum = internet_checksum(&data);

        let mut data_with_checksum = data;
        data_with_checksum.extend_from_slice(&checksum.to_be_bytes());

        assert!(validate_checksum(&data_with_checksum));
    }
}
