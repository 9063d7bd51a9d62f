use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{BookingError, BookingResult};

/// Uppercase letters and digits minus the easily confused `0 O 1 I`.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const MIN_REFERENCE_LENGTH: usize = 7;
pub const MAX_REFERENCE_LENGTH: usize = 10;

/// Produces short, human-typeable booking references. Uniqueness is enforced
/// by the store at insert time; this only draws candidates.
#[derive(Debug, Clone)]
pub struct ReferenceGenerator {
    length: usize,
    max_attempts: u32,
    scripted: Option<Arc<Script>>,
}

#[derive(Debug)]
struct Script {
    candidates: Vec<String>,
    next: AtomicUsize,
}

impl ReferenceGenerator {
    pub fn new(length: usize, max_attempts: u32) -> BookingResult<Self> {
        if !(MIN_REFERENCE_LENGTH..=MAX_REFERENCE_LENGTH).contains(&length) {
            return Err(BookingError::Validation(format!(
                "booking reference length must be {}-{}, got {}",
                MIN_REFERENCE_LENGTH, MAX_REFERENCE_LENGTH, length
            )));
        }
        if max_attempts == 0 {
            return Err(BookingError::Validation("reference attempts must be at least 1".into()));
        }
        Ok(Self { length, max_attempts, scripted: None })
    }

    /// Replays `candidates` in order, cycling. Lets fixtures force collisions.
    pub fn scripted(candidates: Vec<String>, max_attempts: u32) -> Self {
        let length = candidates.first().map_or(8, String::len);
        Self {
            length,
            max_attempts: max_attempts.max(1),
            scripted: (!candidates.is_empty()).then(|| {
                Arc::new(Script { candidates, next: AtomicUsize::new(0) })
            }),
        }
    }

    pub fn generate(&self) -> String {
        if let Some(script) = &self.scripted {
            let index = script.next.fetch_add(1, Ordering::Relaxed) % script.candidates.len();
            return script.candidates[index].clone();
        }

        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Normalizes user input for lookup: trims and uppercases.
    pub fn normalize(reference: &str) -> String {
        reference.trim().to_ascii_uppercase()
    }
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self { length: 8, max_attempts: 5, scripted: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_reference_shape() {
        let generator = ReferenceGenerator::default();
        for _ in 0..100 {
            let reference = generator.generate();
            assert_eq!(reference.len(), 8);
            assert!(reference.bytes().all(|b| ALPHABET.contains(&b)));
            assert!(!reference.contains('O') && !reference.contains('0'));
        }
    }

    #[test]
    fn test_length_bounds() {
        assert!(ReferenceGenerator::new(6, 5).is_err());
        assert!(ReferenceGenerator::new(11, 5).is_err());
        assert!(ReferenceGenerator::new(10, 0).is_err());
        assert_eq!(ReferenceGenerator::new(10, 3).unwrap().generate().len(), 10);
    }

    #[test]
    fn test_scripted_candidates_cycle() {
        let generator = ReferenceGenerator::scripted(vec!["AAAAAAA".into(), "BBBBBBB".into()], 3);
        assert_eq!(generator.generate(), "AAAAAAA");
        assert_eq!(generator.generate(), "BBBBBBB");
        assert_eq!(generator.generate(), "AAAAAAA");
        assert_eq!(generator.max_attempts(), 3);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(ReferenceGenerator::normalize("  k7pq2mzx "), "K7PQ2MZX");
    }
}
