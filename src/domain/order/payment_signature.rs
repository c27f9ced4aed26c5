//! Payment callback signature verification.
//!
//! The provider signs `"<order_id>|<provider_txn_id>|<UPPER(status)>"` with
//! HMAC-SHA256 and sends the lowercase hex digest. Comparison is
//! constant-time to avoid leaking digest prefixes through response timing.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::foundation::DomainError;

/// Verifier for payment callback signatures.
///
/// An absent or empty signing key disables verification entirely.
pub struct PaymentSignatureVerifier {
    key: Option<SecretString>,
}

impl PaymentSignatureVerifier {
    pub fn new(key: Option<SecretString>) -> Self {
        let key = key.filter(|k| !k.expose_secret().trim().is_empty());
        Self { key }
    }

    /// Returns true when a signing key is configured.
    pub fn enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Verifies the provided signature for a callback.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` when the signature is missing or does not
    /// match the expected digest.
    pub fn verify(
        &self,
        order_id: &str,
        provider_txn_id: &str,
        status: &str,
        signature: &str,
    ) -> Result<(), DomainError> {
        let Some(key) = &self.key else {
            return Ok(());
        };

        let provided = signature.trim().to_lowercase();
        if provided.is_empty() {
            return Err(DomainError::invalid_signature());
        }

        let expected = sign_payload(
            key.expose_secret(),
            order_id,
            provider_txn_id,
            status,
        );
        if !constant_time_compare(expected.as_bytes(), provided.as_bytes()) {
            return Err(DomainError::invalid_signature());
        }
        Ok(())
    }
}

/// Computes the lowercase hex HMAC-SHA256 signature for a callback.
pub fn sign_payload(key: &str, order_id: &str, provider_txn_id: &str, status: &str) -> String {
    let payload = format!(
        "{}|{}|{}",
        order_id,
        provider_txn_id,
        status.trim().to_uppercase()
    );
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    const TEST_KEY: &str = "unit-test-key";

    fn verifier() -> PaymentSignatureVerifier {
        PaymentSignatureVerifier::new(Some(SecretString::new(TEST_KEY.to_string())))
    }

    #[test]
    fn accepts_valid_signature() {
        // hmac_sha256("unit-test-key", "order-1|txn-1|SUCCESS")
        let sig = "c497d7588a6cf98f5ace9828473bc7e0a1ea9853b3b7aa2c2cc3b7950a00cef7";
        assert!(verifier().verify("order-1", "txn-1", "SUCCESS", sig).is_ok());
    }

    #[test]
    fn sign_payload_matches_known_vector() {
        assert_eq!(
            sign_payload(TEST_KEY, "order-1", "txn-1", "SUCCESS"),
            "c497d7588a6cf98f5ace9828473bc7e0a1ea9853b3b7aa2c2cc3b7950a00cef7"
        );
    }

    #[test]
    fn status_is_uppercased_before_signing() {
        let sig = sign_payload(TEST_KEY, "order-1", "txn-1", "success");
        assert!(verifier().verify("order-1", "txn-1", "SUCCESS", &sig).is_ok());
    }

    #[test]
    fn provided_signature_is_lowercased() {
        let sig = sign_payload(TEST_KEY, "order-1", "txn-1", "SUCCESS").to_uppercase();
        assert!(verifier().verify("order-1", "txn-1", "SUCCESS", &sig).is_ok());
    }

    #[test]
    fn rejects_wrong_signature() {
        let err = verifier()
            .verify("order-1", "txn-1", "SUCCESS", "bad-signature")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSignature);
    }

    #[test]
    fn rejects_empty_signature() {
        let err = verifier()
            .verify("order-1", "txn-1", "SUCCESS", "")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSignature);
    }

    #[test]
    fn rejects_signature_for_different_payload() {
        let sig = sign_payload(TEST_KEY, "order-1", "txn-1", "SUCCESS");
        let err = verifier()
            .verify("order-2", "txn-1", "SUCCESS", &sig)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSignature);
    }

    #[test]
    fn missing_key_disables_verification() {
        let verifier = PaymentSignatureVerifier::new(None);
        assert!(!verifier.enabled());
        assert!(verifier.verify("o", "t", "SUCCESS", "anything").is_ok());

        let verifier = PaymentSignatureVerifier::new(Some(SecretString::new("  ".to_string())));
        assert!(!verifier.enabled());
        assert!(verifier.verify("o", "t", "SUCCESS", "").is_ok());
    }
}
