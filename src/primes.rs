//! Prime table sizes for the hash table engine.

use crate::error::{Error, Result};

/// Largest prime table length; growth saturates here.
pub(crate) const MAX_PRIME_ARRAY_LENGTH: usize = 0x7FEF_FFFD;

const PRIMES: [usize; 72] = [
    3, 7, 11, 17, 23, 29, 37, 47, 59, 71, 89, 107, 131, 163, 197, 239, 293, 353, 431, 521, 631,
    761, 919, 1103, 1327, 1597, 1931, 2333, 2801, 3371, 4049, 4861, 5839, 7013, 8419, 10103,
    12143, 14591, 17519, 21023, 25229, 30293, 36353, 43627, 52361, 62851, 75431, 90523, 108631,
    130363, 156437, 187751, 225307, 270371, 324449, 389357, 467237, 560689, 672827, 807403,
    968897, 1162687, 1395263, 1674319, 2009191, 2411033, 2893249, 3471899, 4166287, 4999559,
    5999471, 7199369,
];

pub(crate) fn is_prime(candidate: usize) -> bool {
    if candidate & 1 == 0 {
        return candidate == 2;
    }
    let mut divisor = 3;
    while divisor * divisor <= candidate {
        if candidate % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    candidate > 1
}

/// Smallest table size `>= min`.
pub(crate) fn get_prime(min: usize) -> usize {
    if let Some(&p) = PRIMES.iter().find(|&&p| p >= min) {
        return p;
    }
    // Skip primes p where p - 1 is a multiple of the hash multiplier 101.
    let mut candidate = min | 1;
    while candidate < usize::MAX {
        if is_prime(candidate) && (candidate - 1) % 101 != 0 {
            return candidate;
        }
        candidate += 2;
    }
    min
}

/// Next table size when growing from `old_size`: at least double, prime.
pub(crate) fn expand_prime(old_size: usize) -> Result<usize> {
    if old_size >= MAX_PRIME_ARRAY_LENGTH {
        return Err(Error::CapacityOverflow);
    }
    let min = old_size.saturating_mul(2);
    if min > MAX_PRIME_ARRAY_LENGTH {
        return Ok(MAX_PRIME_ARRAY_LENGTH);
    }
    Ok(get_prime(min))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_entries_are_prime() {
        for p in PRIMES {
            assert!(is_prime(p), "{p} is not prime");
        }
        assert!(is_prime(MAX_PRIME_ARRAY_LENGTH));
    }

    #[test]
    fn get_prime_rounds_up() {
        assert_eq!(get_prime(0), 3);
        assert_eq!(get_prime(3), 3);
        assert_eq!(get_prime(4), 7);
        assert_eq!(get_prime(100), 107);
    }

    #[test]
    fn get_prime_searches_beyond_table() {
        let p = get_prime(7_199_370);
        assert!(p >= 7_199_370);
        assert!(is_prime(p));
        assert_ne!((p - 1) % 101, 0);
    }

    #[test]
    fn expand_prime_at_least_doubles() {
        assert_eq!(expand_prime(3).unwrap(), 7);
        assert_eq!(expand_prime(7).unwrap(), 17);
        let grown = expand_prime(1103).unwrap();
        assert!(grown >= 2206 && is_prime(grown));
    }

    #[test]
    fn expand_prime_saturates_then_overflows() {
        assert_eq!(
            expand_prime(MAX_PRIME_ARRAY_LENGTH / 2 + 1).unwrap(),
            MAX_PRIME_ARRAY_LENGTH
        );
        assert!(matches!(
            expand_prime(MAX_PRIME_ARRAY_LENGTH),
            Err(Error::CapacityOverflow)
        ));
    }

    #[test]
    fn small_numbers() {
        assert!(!is_prime(0));
        assert!(!is_prime(1));
        assert!(is_prime(2));
        assert!(!is_prime(9));
    }
}
