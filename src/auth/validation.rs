//! Pure input validators. No I/O, no side effects.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::PasswordConfig;
use crate::error::AppError;

/// Characters stripped by [`sanitize`]. Defense in depth for free-form
/// fields headed to logs or downstream systems; parameterized storage access
/// remains the primary injection defense.
const DANGEROUS_CHARS: &[char] = &['<', '>', '"', '\'', ';', '(', ')', '&', '|'];

/// Check a password against the acceptance policy.
///
/// Short-circuits on the first failing rule and returns a human-readable
/// reason either way.
pub fn validate_password_strength(password: &str, policy: &PasswordConfig) -> (bool, String) {
    if password.chars().count() < policy.min_length {
        return (
            false,
            format!("Password must be at least {} characters long", policy.min_length),
        );
    }
    if password.len() > policy.max_bytes {
        return (
            false,
            format!("Password must be at most {} bytes", policy.max_bytes),
        );
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return (
            false,
            "Password must contain at least one uppercase letter".to_string(),
        );
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return (
            false,
            "Password must contain at least one lowercase letter".to_string(),
        );
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return (false, "Password must contain at least one digit".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_punctuation()) {
        return (
            false,
            "Password must contain at least one special character".to_string(),
        );
    }
    (true, "Password is strong".to_string())
}

/// Convenience wrapper turning a failed strength check into the error the
/// rest of the core speaks.
pub fn ensure_password_strength(password: &str, policy: &PasswordConfig) -> Result<(), AppError> {
    match validate_password_strength(password, policy) {
        (true, _) => Ok(()),
        (false, reason) => Err(AppError::Validation(reason)),
    }
}

/// Strip characters associated with injection attacks and trim whitespace.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !DANGEROUS_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Generate a random password that satisfies the default strength rules.
/// Used by administrative reset flows.
pub fn generate_secure_password(length: usize) -> String {
    const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    const DIGITS: &[u8] = b"0123456789";
    const PUNCT: &[u8] = b"!#$%*+-=?@_~";

    let length = length.max(8);
    let mut rng = rand::thread_rng();

    // One character from each required class, the rest from the full pool.
    let mut chars: Vec<u8> = vec![
        UPPER[rng.gen_range(0..UPPER.len())],
        LOWER[rng.gen_range(0..LOWER.len())],
        DIGITS[rng.gen_range(0..DIGITS.len())],
        PUNCT[rng.gen_range(0..PUNCT.len())],
    ];
    let pool: Vec<u8> = [UPPER, LOWER, DIGITS, PUNCT].concat();
    while chars.len() < length {
        chars.push(pool[rng.gen_range(0..pool.len())]);
    }
    chars.shuffle(&mut rng);

    String::from_utf8(chars).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PasswordConfig {
        PasswordConfig {
            min_length: 8,
            max_bytes: 128,
        }
    }

    #[test]
    fn test_length_bounds() {
        for len in 0..8 {
            let password = "Aa1!".chars().cycle().take(len).collect::<String>();
            let (ok, _) = validate_password_strength(&password, &policy());
            assert!(!ok, "length {len} should be rejected");
        }

        // Exactly 8 with all classes present is accepted.
        let (ok, reason) = validate_password_strength("Aa1!bcde", &policy());
        assert!(ok, "{reason}");

        // 129 is over the maximum.
        let long = format!("Aa1!{}", "x".repeat(125));
        assert_eq!(long.len(), 129);
        let (ok, reason) = validate_password_strength(&long, &policy());
        assert!(!ok);
        assert!(reason.contains("at most"));
    }

    #[test]
    fn test_character_class_rules() {
        let cases = [
            ("lowercase1!", "uppercase"),
            ("UPPERCASE1!", "lowercase"),
            ("NoDigits!!", "digit"),
            ("NoPunct123", "special"),
        ];
        for (password, expected) in cases {
            let (ok, reason) = validate_password_strength(password, &policy());
            assert!(!ok, "{password} should be rejected");
            assert!(reason.contains(expected), "{password}: {reason}");
        }

        let (ok, _) = validate_password_strength("Str0ng!Pass", &policy());
        assert!(ok);
    }

    #[test]
    fn test_sanitize_strips_and_trims() {
        assert_eq!(sanitize("  hello world  "), "hello world");
        assert_eq!(sanitize("<script>alert('x')</script>"), "scriptalertx/script");
        assert_eq!(sanitize("a;b|c&d"), "abcd");
        assert_eq!(sanitize("   "), "");
    }

    #[test]
    fn test_generated_password_is_strong() {
        for _ in 0..20 {
            let password = generate_secure_password(16);
            assert_eq!(password.len(), 16);
            let (ok, reason) = validate_password_strength(&password, &policy());
            assert!(ok, "{password}: {reason}");
        }
        // Requested lengths below the policy minimum are bumped up.
        assert_eq!(generate_secure_password(4).len(), 8);
    }
}
