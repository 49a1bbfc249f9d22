//! bcrypt password hashes.

use bcrypt::BcryptError;

/// Hash `password` with a fresh salt at the given bcrypt cost
pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    bcrypt::hash(password, cost)
}

/// Check `password` against a stored hash; unparseable hashes never match
pub fn verify_password(password: &str, stored: &str) -> bool {
    match bcrypt::verify(password, stored) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is unreadable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Lowest cost bcrypt accepts
    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("hunter22", TEST_COST).unwrap();
        assert!(stored.starts_with("$2b$04$"));
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("hunter23", &stored));
    }

    #[test]
    fn test_default_cost_is_twelve() {
        assert_eq!(bcrypt::DEFAULT_COST, 12);
    }

    #[test]
    fn test_salt_differs_per_hash() {
        assert_ne!(
            hash_password("same", TEST_COST).unwrap(),
            hash_password("same", TEST_COST).unwrap()
        );
    }

    #[test]
    fn test_cost_out_of_range() {
        assert!(hash_password("x", 3).is_err());
        assert!(hash_password("x", 32).is_err());
    }

    #[test]
    fn test_garbage_never_matches() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "sha256$20000$AAAA$AAAA"));
        assert!(!verify_password("x", "$2b$12$tooshort"));
    }
}
