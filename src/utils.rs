/// Split a 16-bit word into its (low, high) bytes
pub fn split_word(word: u16) -> (u8, u8) {
    ((word & 0x00FF) as u8, (word >> 8) as u8)
}

/// Build a 16-bit word from its low and high bytes
pub fn join_word(low: u8, high: u8) -> u16 {
    ((high as u16) << 8) | low as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words() {
        assert_eq!(split_word(0xBEEF), (0xEF, 0xBE));
        assert_eq!(join_word(0xEF, 0xBE), 0xBEEF);
    }
}
