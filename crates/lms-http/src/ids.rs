//! Request identifiers

use chrono::Utc;
use rand::Rng;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Upper bound (exclusive) for the random part: nine base36 digits
const RANDOM_SPACE: u64 = 101_559_956_668_416; // 36^9

/// Format an unsigned integer in lowercase base36
pub fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Generate a request id of the form `req_{base36 millis}_{base36 random}`
pub fn generate_request_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let random = rand::thread_rng().gen_range(0..RANDOM_SPACE);
    format!("req_{}_{}", to_base36(millis), to_base36(random))
}
