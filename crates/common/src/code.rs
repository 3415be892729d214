//! Session code generation.
//!
//! Codes are drawn uniformly from the 62-character alphanumeric charset.
//! The randomness source is injectable so tests can drive the generator
//! deterministically; production uses `ring`'s CSPRNG.

use crate::error::CodeError;
use crate::types::{SessionCode, SESSION_CODE_LENGTH};
use ring::rand::{SecureRandom, SystemRandom};

/// Alphabet session codes are drawn from.
pub const CODE_CHARSET: &[u8; 62] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Bytes at or above this value are rejected (62 * 4 = 248) to keep the
/// distribution over the charset uniform.
const ACCEPT_BELOW: u8 = 248;

/// Random bytes requested from the source per draw.
const DRAW_SIZE: usize = 16;

/// Upper bound on draws before giving up.
const MAX_DRAWS: usize = 8;

/// A source of random bytes.
pub trait RandomSource: Send + Sync {
    /// Fill `dest` with random bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodeError::Rng` if the source cannot produce bytes.
    fn fill(&self, dest: &mut [u8]) -> Result<(), CodeError>;
}

/// CSPRNG-backed randomness source.
pub struct SystemRandomSource {
    rng: SystemRandom,
}

impl SystemRandomSource {
    /// Create a new system randomness source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandomSource {
    fn fill(&self, dest: &mut [u8]) -> Result<(), CodeError> {
        self.rng.fill(dest).map_err(|_| CodeError::Rng)
    }
}

/// Generate a random alphanumeric code of `len` characters.
///
/// # Errors
///
/// Returns `CodeError::Rng` if the source fails, or `CodeError::Exhausted`
/// if it keeps producing only rejected bytes.
pub fn generate_code(len: usize, source: &dyn RandomSource) -> Result<String, CodeError> {
    let mut code = String::with_capacity(len);
    let mut buf = [0u8; DRAW_SIZE];

    for _ in 0..MAX_DRAWS {
        if code.len() == len {
            break;
        }

        source.fill(&mut buf)?;

        for &byte in buf.iter().filter(|&&b| b < ACCEPT_BELOW) {
            if code.len() == len {
                break;
            }
            let idx = usize::from(byte) % CODE_CHARSET.len();
            if let Some(&ch) = CODE_CHARSET.get(idx) {
                code.push(char::from(ch));
            }
        }
    }

    if code.len() == len {
        Ok(code)
    } else {
        Err(CodeError::Exhausted)
    }
}

/// Generate a fresh 4-character session code.
///
/// # Errors
///
/// See [`generate_code`].
pub fn generate_session_code(source: &dyn RandomSource) -> Result<SessionCode, CodeError> {
    generate_code(SESSION_CODE_LENGTH, source).map(SessionCode)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays a fixed byte sequence, cycling when exhausted.
    struct SequenceSource {
        bytes: Vec<u8>,
        cursor: Mutex<usize>,
    }

    impl SequenceSource {
        fn new(bytes: Vec<u8>) -> Self {
            Self {
                bytes,
                cursor: Mutex::new(0),
            }
        }
    }

    impl RandomSource for SequenceSource {
        fn fill(&self, dest: &mut [u8]) -> Result<(), CodeError> {
            let mut cursor = self.cursor.lock().unwrap();
            for slot in dest.iter_mut() {
                *slot = self.bytes[*cursor % self.bytes.len()];
                *cursor += 1;
            }
            Ok(())
        }
    }

    struct FailingSource;

    impl RandomSource for FailingSource {
        fn fill(&self, _dest: &mut [u8]) -> Result<(), CodeError> {
            Err(CodeError::Rng)
        }
    }

    #[test]
    fn test_charset_is_alphanumeric() {
        assert_eq!(CODE_CHARSET.len(), 62);
        assert!(CODE_CHARSET.iter().all(u8::is_ascii_alphanumeric));
    }

    #[test]
    fn test_deterministic_source_maps_bytes_to_charset() {
        let source = SequenceSource::new(vec![0, 1, 26, 61]);
        let code = generate_code(4, &source).unwrap();
        assert_eq!(code, "ABa9");
    }

    #[test]
    fn test_bytes_wrap_modulo_charset() {
        // 62 -> 'A', 124 -> 'A', 63 -> 'B'
        let source = SequenceSource::new(vec![62, 124, 63, 186]);
        assert_eq!(generate_code(4, &source).unwrap(), "AABA");
    }

    #[test]
    fn test_rejected_bytes_are_skipped() {
        let source = SequenceSource::new(vec![250, 255, 248, 3]);
        assert_eq!(generate_code(4, &source).unwrap(), "DDDD");
    }

    #[test]
    fn test_source_of_only_rejected_bytes_is_exhausted() {
        let source = SequenceSource::new(vec![255]);
        assert_eq!(generate_code(4, &source), Err(CodeError::Exhausted));
    }

    #[test]
    fn test_failing_source_propagates() {
        assert_eq!(generate_code(4, &FailingSource), Err(CodeError::Rng));
    }

    #[test]
    fn test_longer_codes_span_multiple_draws() {
        let source = SequenceSource::new(vec![0]);
        let code = generate_code(40, &source).unwrap();
        assert_eq!(code.len(), 40);
        assert!(code.chars().all(|c| c == 'A'));
    }

    #[test]
    fn test_system_source_produces_valid_session_codes() {
        let source = SystemRandomSource::new();
        for _ in 0..100 {
            let code = generate_session_code(&source).unwrap();
            assert!(SessionCode::parse(code.as_str()).is_ok());
        }
    }

    #[test]
    fn test_system_source_codes_differ() {
        let source = SystemRandomSource::new();
        let codes: std::collections::HashSet<String> = (0..50)
            .map(|_| generate_session_code(&source).unwrap().to_string())
            .collect();
        // 62^4 possibilities; 50 draws colliding down to one is not plausible.
        assert!(codes.len() > 1);
    }
}
