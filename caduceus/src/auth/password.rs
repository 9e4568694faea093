//! Password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::errors::Error;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Create Argon2 instance with these parameters.
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Secure defaults for production (Argon2id RFC recommendations)
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Hash a password using Argon2.
///
/// Uses the provided parameters or secure defaults if None.
pub fn hash_string_with_params(input: &str, params: Option<Argon2Params>) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = if let Some(p) = params {
        p.to_argon2()?
    } else {
        Argon2Params::default().to_argon2()?
    };

    let hash = argon2.hash_password(input.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash string: {e}"),
    })?;

    Ok(hash.to_string())
}

/// Hash a password using Argon2 with default secure parameters.
pub fn hash_string(input: &str) -> Result<String, Error> {
    hash_string_with_params(input, None)
}

/// Verify a candidate password against a stored hash.
///
/// An absent hash means "no password set" and never matches. A hash that
/// fails to parse is treated the same way rather than surfaced as an
/// error. Comparison happens inside Argon2, which is constant-time.
/// Verification uses the parameters embedded in the hash itself.
pub fn verify(stored_hash: Option<&str>, candidate: &str) -> bool {
    let Some(stored_hash) = stored_hash else {
        return false;
    };
    let Ok(parsed_hash) = PasswordHash::new(stored_hash) else {
        return false;
    };

    Argon2::default().verify_password(candidate.as_bytes(), &parsed_hash).is_ok()
}

/// Verify a candidate against the retained previous-password hash.
pub fn verify_last(stored_previous_hash: Option<&str>, candidate: &str) -> bool {
    verify(stored_previous_hash, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let input = "test_password_123";
        let hash = hash_string(input).unwrap();

        // Hash should not be empty
        assert!(!hash.is_empty());

        // Should verify correctly
        assert!(verify(Some(&hash), input));

        // Should fail with wrong input
        assert!(!verify(Some(&hash), "wrong_password"));
    }

    #[test]
    fn test_salts_are_random() {
        let input = "same_password";

        let hash1 = hash_string(input).unwrap();
        let hash2 = hash_string(input).unwrap();

        // Same input should produce different hashes due to salt
        assert_ne!(hash1, hash2);

        // But both should verify correctly
        assert!(verify(Some(&hash1), input));
        assert!(verify(Some(&hash2), input));
    }

    #[test]
    fn test_no_password_set_never_matches() {
        assert!(!verify(None, ""));
        assert!(!verify(None, "anything"));
    }

    #[test]
    fn test_unparseable_hash_never_matches() {
        assert!(!verify(Some("not-a-phc-string"), "anything"));
    }

    #[test]
    fn test_previous_password_verification() {
        let old_hash = hash_string("cat").unwrap();
        let new_hash = hash_string("dog").unwrap();

        // After a password change the old hash is retained as the previous
        // hash; both remain independently verifiable
        assert!(verify(Some(&new_hash), "dog"));
        assert!(verify_last(Some(&old_hash), "cat"));
        assert!(!verify_last(Some(&old_hash), "dog"));
    }
}
