use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};

use crate::error::ErrorMessage;

/// Codes we generate are 32 hex characters; anything much longer is not ours
/// and is rejected before it reaches the (deliberately slow) hasher.
const MAX_CODE_LENGTH: usize = 64;

/// Fresh one-time confirmation code, mailed to the user in plain text.
pub fn generate() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Hash a confirmation code with Argon2id for storage
///
/// Only the PHC string (`$argon2id$v=19$...`) is stored, so a leaked `users`
/// table does not hand out working codes. Each call salts anew, hashing the
/// same code twice gives two different strings.
pub fn hash(code: impl Into<String>) -> Result<String, ErrorMessage> {
    let code = code.into();

    if code.is_empty() || code.len() > MAX_CODE_LENGTH {
        return Err(ErrorMessage::WrongConfirmationCode);
    }

    let salt = SaltString::generate(&mut OsRng);

    let hashed_code = Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map_err(|_| ErrorMessage::HashingError)?
        .to_string();

    Ok(hashed_code)
}

/// Check a submitted code against the stored hash and its expiry
///
/// Returns `false` for a wrong code, an expired code, a malformed hash, or a
/// user without a pending code (already exchanged).
pub fn verify(
    code: &str,
    stored_hash: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let (Some(stored_hash), Some(expires_at)) = (stored_hash, expires_at) else {
        return false;
    };

    if now > expires_at || code.is_empty() || code.len() > MAX_CODE_LENGTH {
        return false;
    }

    let Ok(parsed_hash) = PasswordHash::new(stored_hash) else {
        tracing::error!("Stored confirmation code hash is malformed");
        return false;
    };

    // constant-time comparison
    Argon2::default()
        .verify_password(code.as_bytes(), &parsed_hash)
        .is_ok()
}
