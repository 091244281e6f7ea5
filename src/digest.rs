use std::fmt::Debug;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::algorithm::HttpDigest;
use crate::DefaultDigestAlgorithm;

/// The types of error which may occur whilst checking a `Digest` header
/// against a request body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DigestError {
    /// None of the declared digests use a supported algorithm.
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// The body does not hash to the declared value.
    #[error("Digest does not match request body")]
    DigestMismatch,
    /// The header is not of the form `<ALGORITHM>=<base64>`.
    #[error("Malformed digest header: {0:?}")]
    MalformedDigest(String),
}

/// The verification process will use this trait to find the appropriate digest algorithm
/// to use when verifying the body of a request.
///
/// Unless explicitly overridden, the `DefaultDigestProvider` will be used
pub trait DigestProvider: Debug + Send + Sync + 'static {
    /// Returns a digest algorithm for the given name, or `None` if the algorithm is not
    /// recognised by the provider.
    fn provide_digest(&self, name: &str) -> Option<Box<dyn HttpDigest>>;
}

/// Supports the `SHA-256` and `SHA-512` digest algorithms.
#[derive(Debug, Default, Copy, Clone)]
pub struct DefaultDigestProvider;

impl DigestProvider for DefaultDigestProvider {
    fn provide_digest(&self, name: &str) -> Option<Box<dyn HttpDigest>> {
        let name = name.to_ascii_uppercase();
        match name.as_str() {
            "SHA-256" => Some(Box::new(Sha256::new())),
            "SHA-512" => Some(Box::new(Sha512::new())),
            _ => None,
        }
    }
}

/// Computes the `Digest` header value for a request body, eg.
/// `SHA-256=LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ=`.
pub fn compute_digest(body: &[u8]) -> String {
    compute_digest_with(&DefaultDigestAlgorithm::new(), body)
}

/// Computes the `Digest` header value for a request body using a specific algorithm.
/// The label is always taken from the algorithm itself.
pub fn compute_digest_with(digest: &dyn HttpDigest, body: &[u8]) -> String {
    format!("{}={}", digest.name(), digest.http_digest(body))
}

/// Checks a received `Digest` header against the request body.
///
/// The declared algorithm only selects which hash is recomputed. When the header lists
/// several comma separated digests, the first one using a supported algorithm is checked.
pub fn verify_digest(declared: &str, body: &[u8]) -> Result<(), DigestError> {
    verify_digest_with(&DefaultDigestProvider, declared, body)
}

/// Like `verify_digest`, with a caller supplied set of digest algorithms.
pub fn verify_digest_with(
    provider: &dyn DigestProvider,
    declared: &str,
    body: &[u8],
) -> Result<(), DigestError> {
    let mut unsupported = None;

    for part in declared.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        let label = kv.next().unwrap_or_default();
        let value = kv
            .next()
            .ok_or_else(|| DigestError::MalformedDigest(part.trim().to_owned()))?;

        let algorithm = match provider.provide_digest(label) {
            Some(algorithm) => algorithm,
            None => {
                unsupported.get_or_insert_with(|| label.to_owned());
                continue;
            }
        };

        let expected = STANDARD
            .decode(value)
            .map_err(|_| DigestError::MalformedDigest(part.trim().to_owned()))?;
        let actual = algorithm.digest_bytes(body);

        return if bool::from(actual.ct_eq(&expected)) {
            Ok(())
        } else {
            debug!("{} digest mismatch over {} byte body", algorithm.name(), body.len());
            Err(DigestError::DigestMismatch)
        };
    }

    Err(DigestError::UnsupportedAlgorithm(
        unsupported.unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::{prop_assert, prop_assert_eq, prop_assume, proptest};

    #[test]
    fn label_matches_algorithm() {
        let digest = compute_digest(b"hello");
        assert_eq!(
            digest,
            "SHA-256=LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ="
        );
        assert!(verify_digest(&digest, b"hello").is_ok());
    }

    #[test]
    fn sha512() {
        let digest = compute_digest_with(&Sha512::new(), b"hello");
        assert!(digest.starts_with("SHA-512="));
        assert_eq!(verify_digest(&digest, b"hello"), Ok(()));
        assert_eq!(
            verify_digest(&digest, b"hello!"),
            Err(DigestError::DigestMismatch)
        );
    }

    #[test]
    fn sha512_body_under_sha256_label_is_rejected() {
        let mislabelled = format!("SHA-256={}", Sha512::new().http_digest(b"hello"));
        assert_eq!(
            verify_digest(&mislabelled, b"hello"),
            Err(DigestError::DigestMismatch)
        );
    }

    #[test]
    fn unsupported_algorithm() {
        assert_eq!(
            verify_digest("MD5=XUFAKrxLKna5cZ2REBfFkg==", b"hello"),
            Err(DigestError::UnsupportedAlgorithm("MD5".into()))
        );
    }

    #[test]
    fn labels_are_case_insensitive() {
        let digest = compute_digest(b"hello").replacen("SHA-256", "sha-256", 1);
        assert_eq!(verify_digest(&digest, b"hello"), Ok(()));
    }

    #[test]
    fn picks_first_supported_entry() {
        let header = format!("MD5=XUFAKrxLKna5cZ2REBfFkg==, {}", compute_digest(b"hello"));
        assert_eq!(verify_digest(&header, b"hello"), Ok(()));
    }

    #[test]
    fn malformed() {
        assert!(matches!(
            verify_digest("SHA-256", b"hello"),
            Err(DigestError::MalformedDigest(_))
        ));
        assert!(matches!(
            verify_digest("SHA-256=!!!not base64!!!", b"hello"),
            Err(DigestError::MalformedDigest(_))
        ));
    }

    #[test]
    fn truncated_digest_does_not_match() {
        let digest = format!("SHA-256={}", STANDARD.encode(&Sha256::digest(b"hello")[..16]));
        assert_eq!(
            verify_digest(&digest, b"hello"),
            Err(DigestError::DigestMismatch)
        );
    }

    proptest! {
        #[test]
        fn digest_round_trip(body: Vec<u8>) {
            prop_assert_eq!(verify_digest(&compute_digest(&body), &body), Ok(()));
        }

        #[test]
        fn different_bodies_mismatch(b1: Vec<u8>, b2: Vec<u8>) {
            prop_assume!(b1 != b2);
            prop_assert!(matches!(
                verify_digest(&compute_digest(&b1), &b2),
                Err(DigestError::DigestMismatch)
            ));
        }
    }
}
