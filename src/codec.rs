// src/codec.rs
//
// Action-state tokens. The ordered active/inactive flags of a model are packed
// eight to a byte (flag `i` lands in byte `i / 8`, bit `i % 8`) followed by a
// single sentinel bit at position `n`, where `n` is the flag count. Bytes are
// read as little-endian 64-bit words, each word is rendered as upper-case hex
// without leading zeros, and words are joined low to high with ':'.
//
// The sentinel makes the length part of the token, so vectors of different
// lengths never share a token, and the top word is never zero.
//
// Decoding accepts hex digits in either case. Encoding always emits the
// canonical upper-case form, so decoding `a1` and re-encoding yields `A1`;
// tokens are compared case-insensitively wherever they are matched.

use thiserror::Error;

const BITS_PER_WORD: usize = 64;
const GROUP_SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid character [{character}] at position {position}; tokens only contain hex digits and ':'")]
    InvalidCharacter { character: char, position: usize },

    #[error("expected {expected} group(s) for {actions} actions, found {found}")]
    GroupCount { expected: usize, found: usize, actions: usize },

    #[error("group {0} is empty")]
    EmptyGroup(usize),

    #[error("group {0} has a leading zero")]
    LeadingZero(usize),

    #[error("group {0} exceeds 64 bits")]
    GroupOverflow(usize),

    #[error("token does not describe exactly {0} actions")]
    LengthMismatch(usize),
}

/// Anything whose ordered management actions can be read and written as flags.
pub trait ActionStates {
    fn action_count(&self) -> usize;
    fn action_flags(&self) -> Vec<bool>;
    fn apply_action_flags(&mut self, flags: &[bool]);
}

pub fn encode<M: ActionStates + ?Sized>(model: &M) -> String {
    encode_flags(&model.action_flags())
}

/// Decodes `token` onto `model`. The model is left untouched when the token is
/// rejected.
pub fn decode<M: ActionStates + ?Sized>(token: &str, model: &mut M) -> Result<(), CodecError> {
    let flags = decode_flags(token, model.action_count())?;
    model.apply_action_flags(&flags);
    Ok(())
}

/// True when every character is a hex digit or the group separator.
pub fn is_token_shaped(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_hexdigit() || c == GROUP_SEPARATOR)
}

fn word_count(actions: usize) -> usize {
    actions / BITS_PER_WORD + 1
}

pub fn encode_flags(flags: &[bool]) -> String {
    let mut bytes = vec![0u8; flags.len() / 8 + 1];
    for (index, _) in flags.iter().enumerate().filter(|(_, active)| **active) {
        bytes[index / 8] |= 1 << (index % 8);
    }
    let sentinel = flags.len();
    bytes[sentinel / 8] |= 1 << (sentinel % 8);

    let words = bytes.chunks(8).map(|chunk| {
        let mut padded = [0u8; 8];
        padded[..chunk.len()].copy_from_slice(chunk);
        u64::from_le_bytes(padded)
    });

    words
        .map(|word| format!("{word:X}"))
        .collect::<Vec<_>>()
        .join(&GROUP_SEPARATOR.to_string())
}

pub fn decode_flags(token: &str, actions: usize) -> Result<Vec<bool>, CodecError> {
    if let Some((position, character)) = token
        .chars()
        .enumerate()
        .find(|(_, c)| !(c.is_ascii_hexdigit() || *c == GROUP_SEPARATOR))
    {
        return Err(CodecError::InvalidCharacter { character, position });
    }

    let groups: Vec<&str> = token.split(GROUP_SEPARATOR).collect();
    let expected = word_count(actions);
    if groups.len() != expected {
        return Err(CodecError::GroupCount { expected, found: groups.len(), actions });
    }

    let mut words = Vec::with_capacity(groups.len());
    for (index, group) in groups.iter().enumerate() {
        if group.is_empty() {
            return Err(CodecError::EmptyGroup(index));
        }
        if group.len() > 1 && group.starts_with('0') {
            return Err(CodecError::LeadingZero(index));
        }
        if group.len() > 16 {
            return Err(CodecError::GroupOverflow(index));
        }
        let word =
            u64::from_str_radix(group, 16).map_err(|_| CodecError::GroupOverflow(index))?;
        words.push(word);
    }

    // The top word must hold the sentinel as its highest set bit.
    let top = words[words.len() - 1];
    if top >> (actions % BITS_PER_WORD) != 1 {
        return Err(CodecError::LengthMismatch(actions));
    }

    let flags = (0..actions)
        .map(|index| {
            let word = words[index / BITS_PER_WORD];
            word & (1u64 << (index % BITS_PER_WORD)) != 0
        })
        .collect();
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    struct Flags(Vec<bool>);

    impl ActionStates for Flags {
        fn action_count(&self) -> usize {
            self.0.len()
        }
        fn action_flags(&self) -> Vec<bool> {
            self.0.clone()
        }
        fn apply_action_flags(&mut self, flags: &[bool]) {
            self.0.copy_from_slice(flags);
        }
    }

    fn vector(bits: u32, len: usize) -> Vec<bool> {
        (0..len).map(|i| bits & (1 << i) != 0).collect()
    }

    #[test]
    fn known_tokens_for_seven_actions() {
        assert_eq!(encode_flags(&[false; 7]), "80");
        assert_eq!(
            encode_flags(&[true, false, false, false, false, true, false]),
            "A1"
        );
        assert_eq!(encode_flags(&[true, true, false, false, false, true, false]), "A3");
    }

    #[test]
    fn empty_vector_is_the_bare_sentinel() {
        assert_eq!(encode_flags(&[]), "1");
        assert_eq!(decode_flags("1", 0).unwrap(), Vec::<bool>::new());
    }

    #[test]
    fn every_seven_flag_vector_round_trips() {
        for bits in 0..(1u32 << 7) {
            let flags = vector(bits, 7);
            let token = encode_flags(&flags);
            assert_eq!(decode_flags(&token, 7).unwrap(), flags, "token {token}");
        }
    }

    #[test]
    fn long_vectors_round_trip_across_word_boundaries() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in [63, 64, 65, 127, 128, 129, 300] {
            for _ in 0..20 {
                let flags: Vec<bool> = (0..len).map(|_| rng.gen_bool(0.5)).collect();
                let token = encode_flags(&flags);
                assert_eq!(token.split(':').count(), len / 64 + 1);
                assert_eq!(decode_flags(&token, len).unwrap(), flags);
            }
        }
    }

    #[test]
    fn tokens_of_different_lengths_do_not_collide() {
        let short = encode_flags(&[false; 3]);
        let long = encode_flags(&[false; 4]);
        assert_ne!(short, long);
        assert_eq!(decode_flags(&short, 4), Err(CodecError::LengthMismatch(4)));
    }

    #[test]
    fn lower_case_tokens_decode_to_the_canonical_form() {
        assert_eq!(decode_flags("a1", 7).unwrap(), decode_flags("A1", 7).unwrap());

        let mut model = Flags(vec![false; 7]);
        decode("a1", &mut model).unwrap();
        assert_eq!(encode(&model), "A1");
        assert!(encode(&model).eq_ignore_ascii_case("a1"));
    }

    #[test]
    fn malformed_tokens_leave_the_model_untouched() {
        let original = vec![true, false, true, false, false, false, true];
        let mut model = Flags(original.clone());

        for token in ["G1", "A1!", " A1", "", "0A1", "A1:1", "1A1", "40"] {
            assert!(decode(token, &mut model).is_err(), "token {token:?} accepted");
            assert_eq!(model.0, original);
        }
    }

    #[test]
    fn invalid_character_reports_position() {
        assert_eq!(
            decode_flags("8Z", 7),
            Err(CodecError::InvalidCharacter { character: 'Z', position: 1 })
        );
    }

    #[test]
    fn decode_then_encode_reproduces_the_token() {
        let mut model = Flags(vec![false; 7]);
        decode("A3", &mut model).unwrap();
        assert_eq!(encode(&model), "A3");
    }

    #[test]
    fn token_shape() {
        assert!(is_token_shaped("A1:ff:0"));
        assert!(is_token_shaped(""));
        assert!(!is_token_shaped("A1-B2"));
    }
}
