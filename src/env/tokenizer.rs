//! A dependency-free instruction encoder.
//!
//! Produces BERT-shaped sequences (`[CLS] tokens... [SEP] [PAD]...`) where each
//! lower-cased word or punctuation mark maps to a stable id by hashing. It is
//! not a learned vocabulary; it only gives agents a deterministic fixed-length
//! view of the instruction.

use super::traits::TextEncoder;

pub const PAD_ID: u32 = 0;
pub const CLS_ID: u32 = 101;
pub const SEP_ID: u32 = 102;

/// Ids below this are reserved for special tokens.
const FIRST_WORD_ID: u32 = 1000;

#[derive(Debug, Clone)]
pub struct HashingTokenizer {
    vocab_size: u32,
}

impl HashingTokenizer {
    /// `vocab_size` bounds the ids produced (exclusive).
    pub fn new(vocab_size: u32) -> Self {
        Self {
            vocab_size: vocab_size.max(FIRST_WORD_ID + 1),
        }
    }

    fn word_id(&self, word: &str) -> u32 {
        // FNV-1a, stable across runs and platforms.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in word.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        let span = u64::from(self.vocab_size - FIRST_WORD_ID);
        FIRST_WORD_ID + (hash % span) as u32
    }

    fn words(text: &str) -> Vec<String> {
        let mut words = Vec::new();
        let mut current = String::new();
        for ch in text.chars() {
            if ch.is_alphanumeric() {
                current.extend(ch.to_lowercase());
                continue;
            }
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            if !ch.is_whitespace() {
                words.push(ch.to_string());
            }
        }
        if !current.is_empty() {
            words.push(current);
        }
        words
    }
}

impl Default for HashingTokenizer {
    fn default() -> Self {
        Self::new(30_522)
    }
}

impl TextEncoder for HashingTokenizer {
    fn encode(&self, text: &str, max_len: usize) -> Vec<u32> {
        if max_len == 0 {
            return Vec::new();
        }
        let mut ids = Vec::with_capacity(max_len);
        ids.push(CLS_ID);
        // Leave room for [SEP].
        let budget = max_len.saturating_sub(2);
        ids.extend(
            Self::words(text)
                .iter()
                .take(budget)
                .map(|w| self.word_id(w)),
        );
        if max_len > 1 {
            ids.push(SEP_ID);
        }
        ids.resize(max_len, PAD_ID);
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_fixed_length() {
        let tok = HashingTokenizer::default();
        let ids = tok.encode("Park next to the wall.", 64);
        assert_eq!(ids.len(), 64);
        assert_eq!(ids[0], CLS_ID);
        // park next to the wall .
        assert_eq!(ids[7], SEP_ID);
        assert!(ids[8..].iter().all(|&id| id == PAD_ID));
    }

    #[test]
    fn truncates_and_keeps_separator() {
        let tok = HashingTokenizer::default();
        let long = "slot ".repeat(100);
        let ids = tok.encode(&long, 16);
        assert_eq!(ids.len(), 16);
        assert_eq!(ids[15], SEP_ID);
    }

    #[test]
    fn encoding_is_case_insensitive_and_deterministic() {
        let tok = HashingTokenizer::default();
        assert_eq!(tok.encode("Near EXIT", 8), tok.encode("near exit", 8));
        assert!(tok
            .encode("charging", 4)
            .iter()
            .all(|&id| id < 30_522));
    }
}
