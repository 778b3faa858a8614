use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::PasswordConfig;
use crate::error::AppError;

/// bcrypt's native input ceiling in bytes.
const BCRYPT_MAX_BYTES: usize = 72;

/// Hashes and verifies passwords.
///
/// New credentials are always bcrypt over a base64-encoded SHA-256 digest of
/// the password. The digest step exists solely to defeat bcrypt's 72-byte
/// input ceiling (and keeps NUL bytes out of the bcrypt input); base64 of a
/// 32-byte digest is 44 bytes, comfortably inside the limit.
///
/// Verification also accepts credentials produced before the digest step was
/// introduced, so those accounts keep working without a forced reset.
pub struct PasswordHasher {
    policy: PasswordConfig,
    cost: u32,
}

/// One verification scheme: `(password, credential) -> matched`.
/// Errors mean "this credential was not produced by this scheme".
type VerifyStrategy = fn(&str, &str) -> Result<bool, bcrypt::BcryptError>;

/// Ordered by priority; the current scheme comes first. New hashes are only
/// ever produced by the first entry.
const VERIFY_STRATEGIES: &[(&str, VerifyStrategy)] = &[
    ("sha256-bcrypt", verify_digested),
    ("legacy-bcrypt", verify_raw),
];

/// Current scheme: the password is digest-normalized before bcrypt.
fn verify_digested(password: &str, credential: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(digest_password(password), credential)
}

/// Legacy scheme, pre-normalization: bcrypt over the raw password. Only
/// applicable when the raw password fits bcrypt's native limit.
fn verify_raw(password: &str, credential: &str) -> Result<bool, bcrypt::BcryptError> {
    if password.len() > BCRYPT_MAX_BYTES {
        return Ok(false);
    }
    bcrypt::verify(password, credential)
}

/// Deterministic fixed-length normalization of a password of any accepted
/// length. A cryptographic digest, not a truncation.
fn digest_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    STANDARD.encode(digest)
}

impl PasswordHasher {
    pub fn new(policy: PasswordConfig, cost: u32) -> Self {
        Self { policy, cost }
    }

    /// Hash a password into a storable credential.
    ///
    /// Length bounds are enforced by the input validator upstream; they are
    /// re-checked here so the hasher is safe to call directly.
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        if password.chars().count() < self.policy.min_length {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters long",
                self.policy.min_length
            )));
        }
        if password.len() > self.policy.max_bytes {
            return Err(AppError::Validation(format!(
                "Password must be at most {} bytes",
                self.policy.max_bytes
            )));
        }

        bcrypt::hash(digest_password(password), self.cost)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
    }

    /// Verify a password against a stored credential of any historical
    /// scheme. Never errors: a strategy failure (for example a credential in
    /// a format that strategy cannot parse) is a non-match, and a full miss
    /// is `false`. Fail closed.
    pub fn verify(&self, password: &str, credential: &str) -> bool {
        for (name, strategy) in VERIFY_STRATEGIES {
            match strategy(password, credential) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    debug!(strategy = name, error = %e, "verification strategy did not apply");
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum bcrypt cost keeps these tests fast.
    fn hasher() -> PasswordHasher {
        PasswordHasher::new(
            PasswordConfig {
                min_length: 8,
                max_bytes: 128,
            },
            4,
        )
    }

    #[test]
    fn test_hash_and_verify_round_trip() {
        let hasher = hasher();
        let credential = hasher.hash("Str0ng!Pass").unwrap();
        assert!(hasher.verify("Str0ng!Pass", &credential));
        assert!(!hasher.verify("Wr0ng!Pass", &credential));
    }

    #[test]
    fn test_hash_rejects_out_of_policy_lengths() {
        let hasher = hasher();
        assert!(matches!(
            hasher.hash("Short1!"),
            Err(AppError::Validation(_))
        ));
        let long = "A".repeat(129);
        assert!(matches!(hasher.hash(&long), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_long_passwords_beyond_bcrypt_limit() {
        let hasher = hasher();
        // 100 bytes: over bcrypt's 72-byte ceiling, inside our 128-byte bound.
        let password = format!("{}Aa1!", "x".repeat(96));
        let credential = hasher.hash(&password).unwrap();
        assert!(hasher.verify(&password, &credential));
        // A password agreeing on the first 72 bytes must not pass.
        let truncated: String = password.chars().take(72).collect();
        assert!(!hasher.verify(&truncated, &credential));
    }

    #[test]
    fn test_legacy_credential_still_verifies() {
        let hasher = hasher();
        // A credential produced before digest normalization existed.
        let legacy = bcrypt::hash("Old-Sch00l!", 4).unwrap();
        assert!(hasher.verify("Old-Sch00l!", &legacy));
        assert!(!hasher.verify("Old-Sch00l?", &legacy));
    }

    #[test]
    fn test_new_hashes_use_current_scheme() {
        let hasher = hasher();
        let credential = hasher.hash("Str0ng!Pass").unwrap();
        // The credential must match the digested form, not the raw password.
        assert!(bcrypt::verify(digest_password("Str0ng!Pass"), &credential).unwrap());
        assert!(!bcrypt::verify("Str0ng!Pass", &credential).unwrap());
    }

    #[test]
    fn test_verify_never_panics_on_garbage_credential() {
        let hasher = hasher();
        assert!(!hasher.verify("Str0ng!Pass", "not-a-bcrypt-hash"));
        assert!(!hasher.verify("Str0ng!Pass", ""));
    }
}
