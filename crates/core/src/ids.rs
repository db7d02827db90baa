//! Id and random token helpers

use rand::RngCore;

/// New document id (UUID v4)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `n` random bytes, hex-encoded (2n chars)
pub fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Human-facing confirmation number, e.g. `PAY1A2B3C4D`
pub fn confirmation_number(prefix: &str, n: usize) -> String {
    format!("{}{}", prefix, random_hex(n).to_uppercase())
}
