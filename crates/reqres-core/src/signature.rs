//! HMAC-SHA256 cookie signatures in the `value.signature` layout.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Appends `.` and the unpadded base64 HMAC of `value` keyed by `secret`.
pub fn sign(value: &str, secret: &str) -> String {
    format!("{value}.{}", mac(value, secret))
}

/// Returns the unsigned value when the trailing signature matches, `None` otherwise.
pub fn unsign<'a>(signed: &'a str, secret: &str) -> Option<&'a str> {
    let (value, _) = signed.rsplit_once('.')?;
    let expected = sign(value, secret);
    bool::from(expected.as_bytes().ct_eq(signed.as_bytes())).then_some(value)
}

fn mac(value: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(value.as_bytes());
    STANDARD_NO_PAD.encode(mac.finalize().into_bytes())
}
