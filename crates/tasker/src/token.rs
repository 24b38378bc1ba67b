//! Opaque continuation tokens for cursor-based listing.
//!
//! A token carries the last id a caller has seen and the page size it asked
//! for. Tokens are HMAC protected so that a caller cannot forge a cursor into
//! the index, and they use the URL-safe base64 alphabet without padding so
//! they can travel in a query parameter untouched.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Token format version.
const TOKEN_VERSION: u8 = 1;

/// HMAC key length in bytes.
pub const PAGE_TOKEN_KEY_LENGTH: usize = 32;

/// HMAC output length (truncated).
const MAC_LENGTH: usize = 16;

/// The decoded cursor: resume strictly after `id` with pages of `size`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageToken {
    pub id: String,
    pub size: i64,
}

impl PageToken {
    pub fn new(id: impl Into<String>, size: i64) -> Self {
        Self {
            id: id.into(),
            size,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u8,
    token: PageToken,
    mac: [u8; MAC_LENGTH],
}

/// Errors produced while decoding a page token.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PageTokenError {
    /// Not base64, not a token, or trailing bytes.
    #[error("malformed page token")]
    InvalidFormat,
    /// The token was altered or signed with another key.
    #[error("page token failed verification")]
    InvalidMac,
    #[error("unsupported page token version {0}")]
    UnsupportedVersion(u8),
}

/// Page token encoder/decoder.
///
/// Encoding is a pure function of the key and the token, so two codecs built
/// from the same key (for example from the same operator secret) accept each
/// other's tokens.
#[derive(Clone)]
pub struct PageTokenCodec {
    key: [u8; PAGE_TOKEN_KEY_LENGTH],
}

impl PageTokenCodec {
    pub const fn new(key: [u8; PAGE_TOKEN_KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// A codec with a key drawn from the thread-local RNG.
    ///
    /// Tokens minted by this codec are only valid for its lifetime, which is
    /// usually the lifetime of the process.
    pub fn with_random_key() -> Self {
        use rand::RngCore;
        let mut key = [0u8; PAGE_TOKEN_KEY_LENGTH];
        rand::rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Derives the key from an operator secret of any length.
    pub fn from_secret(secret: &[u8]) -> Self {
        let digest = Sha256::digest(secret);
        let mut key = [0u8; PAGE_TOKEN_KEY_LENGTH];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encodes `token` into an opaque string over `[A-Za-z0-9_-]`.
    pub fn encode(&self, token: &PageToken) -> String {
        let envelope = Envelope {
            version: TOKEN_VERSION,
            mac: self.sign(TOKEN_VERSION, token),
            token: token.clone(),
        };
        // postcard cannot fail on strings and integers
        let bytes = postcard::to_allocvec(&envelope).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Decodes and verifies a token produced by [`PageTokenCodec::encode`].
    ///
    /// # Errors
    ///
    /// - [`PageTokenError::InvalidFormat`] for anything that is not a token.
    /// - [`PageTokenError::InvalidMac`] for altered tokens or tokens signed
    ///   with a different key.
    /// - [`PageTokenError::UnsupportedVersion`] for a verified token of
    ///   another format version.
    pub fn decode(&self, encoded: &str) -> Result<PageToken, PageTokenError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| PageTokenError::InvalidFormat)?;

        let (envelope, rest) = postcard::take_from_bytes::<Envelope>(&bytes)
            .map_err(|_| PageTokenError::InvalidFormat)?;
        if !rest.is_empty() {
            return Err(PageTokenError::InvalidFormat);
        }

        let expected = self.sign(envelope.version, &envelope.token);
        if !constant_time_eq(&expected, &envelope.mac) {
            return Err(PageTokenError::InvalidMac);
        }

        if envelope.version != TOKEN_VERSION {
            return Err(PageTokenError::UnsupportedVersion(envelope.version));
        }

        Ok(envelope.token)
    }

    fn sign(&self, version: u8, token: &PageToken) -> [u8; MAC_LENGTH] {
        let mut out = [0u8; MAC_LENGTH];
        let Ok(body) = postcard::to_allocvec(&(version, token)) else {
            return out;
        };
        // HMAC accepts keys of any length
        let Ok(mut mac) = <Hmac<Sha256>>::new_from_slice(&self.key) else {
            return out;
        };
        mac.update(&body);
        let full = mac.finalize().into_bytes();
        out.copy_from_slice(&full[..MAC_LENGTH]);
        out
    }
}

impl core::fmt::Debug for PageTokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageTokenCodec").finish_non_exhaustive()
    }
}

fn constant_time_eq(a: &[u8; MAC_LENGTH], b: &[u8; MAC_LENGTH]) -> bool {
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> PageTokenCodec {
        PageTokenCodec::new([7u8; PAGE_TOKEN_KEY_LENGTH])
    }

    #[test]
    fn round_trips_exactly() {
        let codec = codec();
        for token in [
            PageToken::new("7123895123451904", 25),
            PageToken::new("", 0),
            PageToken::new("", -1),
            PageToken::new("42", i64::MIN),
            PageToken::new("unicode ✓ id", i64::MAX),
        ] {
            let encoded = codec.encode(&token);
            assert_eq!(codec.decode(&encoded), Ok(token));
        }
    }

    #[test]
    fn encoding_is_pure() {
        let token = PageToken::new("99", 3);
        assert_eq!(codec().encode(&token), codec().encode(&token));
        assert_eq!(
            PageTokenCodec::from_secret(b"hunter2").encode(&token),
            PageTokenCodec::from_secret(b"hunter2").encode(&token)
        );
    }

    #[test]
    fn output_is_url_safe() {
        let encoded = codec().encode(&PageToken::new("??//++==", 1000));
        assert!(
            encoded
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'),
            "{encoded}"
        );
    }

    #[test]
    fn garbage_is_invalid_format() {
        let codec = codec();
        for input in ["", "!!!", "not a token", "AAAA", "____", "ü", "\0\0"] {
            assert!(codec.decode(input).is_err(), "{input:?}");
        }
        assert_eq!(codec.decode("%%%"), Err(PageTokenError::InvalidFormat));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let codec = codec();
        let mut bytes = URL_SAFE_NO_PAD
            .decode(codec.encode(&PageToken::new("1", 1)))
            .unwrap();
        bytes.push(0);
        assert_eq!(
            codec.decode(&URL_SAFE_NO_PAD.encode(bytes)),
            Err(PageTokenError::InvalidFormat)
        );
    }

    #[test]
    fn tampered_token_fails_verification() {
        let codec = codec();
        let genuine = PageToken::new("100", 3);
        let envelope = Envelope {
            version: TOKEN_VERSION,
            mac: codec.sign(TOKEN_VERSION, &genuine),
            token: PageToken::new("100", 1000),
        };
        let forged = URL_SAFE_NO_PAD.encode(postcard::to_allocvec(&envelope).unwrap());
        assert_eq!(codec.decode(&forged), Err(PageTokenError::InvalidMac));
    }

    #[test]
    fn other_key_fails_verification() {
        let token = PageToken::new("100", 3);
        let encoded = codec().encode(&token);
        assert_eq!(
            PageTokenCodec::with_random_key().decode(&encoded),
            Err(PageTokenError::InvalidMac)
        );
    }

    #[test]
    fn unknown_version_is_reported_after_verification() {
        let codec = codec();
        let token = PageToken::new("5", 5);
        let envelope = Envelope {
            version: 9,
            mac: codec.sign(9, &token),
            token,
        };
        let encoded = URL_SAFE_NO_PAD.encode(postcard::to_allocvec(&envelope).unwrap());
        assert_eq!(
            codec.decode(&encoded),
            Err(PageTokenError::UnsupportedVersion(9))
        );
    }
}
