use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::{config::PasswordPolicy, error::AppError};

/// Rejects passwords shorter than the policy minimum, counted in characters.
pub fn check_policy(plain: &str, policy: &PasswordPolicy) -> Result<(), AppError> {
    if plain.chars().count() < policy.min_len {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters long",
            policy.min_len
        )));
    }
    Ok(())
}

/// One-way digest of `plain` as an Argon2 PHC string (salt included).
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(digest)
}

/// Compares `plain` against a stored digest. Argon2 verification is
/// constant-time in the digest comparison.
pub fn password_matches(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_verifies_same_password() {
        let digest = hash_password("secret1").expect("hashing should succeed");
        assert!(password_matches("secret1", &digest).expect("verify should succeed"));
        assert_ne!(digest, "secret1");
    }

    #[test]
    fn rejects_wrong_password() {
        let digest = hash_password("secret1").expect("hashing should succeed");
        assert!(!password_matches("secret2", &digest).expect("verify should not error"));
    }

    #[test]
    fn errors_on_malformed_digest() {
        assert!(password_matches("anything", "not-a-valid-hash").is_err());
    }

    #[test]
    fn policy_counts_characters() {
        let policy = PasswordPolicy { min_len: 6 };
        assert!(check_policy("12345", &policy).is_err());
        assert!(check_policy("123456", &policy).is_ok());
        // six characters, more than six bytes
        assert!(check_policy("éééééé", &policy).is_ok());
    }
}
