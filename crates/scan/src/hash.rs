use ecotag_core::EstimateContext;
use sha2::{Digest, Sha256};

/// Compute SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Content address of an image: hex SHA-256 over every byte of the upload.
pub fn image_key(image_bytes: &[u8]) -> String {
    to_hex(&sha256_bytes(image_bytes))
}

/// Cache key for an analysis request. With no caller context this is the
/// plain [`image_key`]; otherwise the serialized context is hashed in after
/// the image bytes, so differently parameterised estimates never share an
/// entry.
pub fn response_key(image_bytes: &[u8], context: &EstimateContext) -> String {
    if *context == EstimateContext::default() {
        return image_key(image_bytes);
    }

    let encoded = serde_json::to_vec(context).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(image_bytes);
    hasher.update([0u8]);
    hasher.update(&encoded);
    to_hex(&hasher.finalize().into())
}

/// First eight hex chars, enough to tell entries apart in logs.
pub fn short_key(key: &str) -> &str {
    key.get(..8).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_bytes_known_vector() {
        // SHA-256 of empty bytes is a known constant.
        let hex = to_hex(&sha256_bytes(b""));
        assert_eq!(
            hex,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn image_key_depends_on_every_byte() {
        let a = image_key(b"\xff\xd8\xff\xe0 tag photo");
        let b = image_key(b"\xff\xd8\xff\xe0 tag photp");
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(a, image_key(b"\xff\xd8\xff\xe0 tag photo"));
    }

    #[test]
    fn response_key_folds_in_context() {
        let image = b"tag photo";
        let heavy = EstimateContext { weight_g: Some(2000.0), ..Default::default() };
        let jeans = EstimateContext { garment_type: Some("jeans".into()), ..Default::default() };

        assert_eq!(response_key(image, &EstimateContext::default()), image_key(image));
        assert_ne!(response_key(image, &heavy), image_key(image));
        assert_ne!(response_key(image, &heavy), response_key(image, &jeans));
        assert_eq!(response_key(image, &heavy), response_key(image, &heavy.clone()));
    }

    #[test]
    fn short_key_handles_short_input() {
        assert_eq!(short_key("abcdef0123456789"), "abcdef01");
        assert_eq!(short_key("abc"), "abc");
    }
}
