use std::fmt::Debug;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256, Sha512};

mod openssl;
pub use self::openssl::*;

/// Implementations of this trait correspond to signature algorithms
/// listed here:
/// https://tools.ietf.org/id/draft-cavage-http-signatures-12.html#hsa-registry
///
/// Only `rsa-sha256` is implemented by this crate.
pub trait HttpSignature: Debug + Send + Sync + 'static {
    /// Must return the name exactly as specified in the above list of HTTP
    /// signature algorithms.
    fn name(&self) -> &str;
}

/// The signing half of a signature algorithm.
pub trait HttpSignatureSign: HttpSignature {
    /// Returns the raw signature over `bytes_to_sign`.
    fn http_sign(&self, bytes_to_sign: &[u8]) -> Result<Vec<u8>, ::openssl::error::ErrorStack>;
}

/// The verification half of a signature algorithm.
pub trait HttpSignatureVerify: HttpSignature {
    /// Returns true if `signature` is valid for the provided content. A signature
    /// which cannot be checked at all (wrong length, backend failure) is invalid.
    fn http_verify(&self, bytes_to_verify: &[u8], signature: &[u8]) -> bool;
}

/// Implementations of this trait correspond to digest algorithms
/// listed here:
/// https://www.iana.org/assignments/http-dig-alg/http-dig-alg.xhtml
pub trait HttpDigest: Debug + Send + Sync + 'static {
    /// Must return the name exactly as specified in the above list of HTTP
    /// digest algorithms.
    fn name(&self) -> &str;
    /// Returns the raw hash of the provided bytes.
    fn digest_bytes(&self, bytes_to_digest: &[u8]) -> Vec<u8>;
    /// Returns the encoded digest, ready for inclusion in the HTTP Digest
    /// header. Both supported algorithms are specified to use base64.
    fn http_digest(&self, bytes_to_digest: &[u8]) -> String {
        STANDARD.encode(self.digest_bytes(bytes_to_digest))
    }
}

impl HttpDigest for Sha256 {
    fn name(&self) -> &str {
        "SHA-256"
    }
    fn digest_bytes(&self, bytes_to_digest: &[u8]) -> Vec<u8> {
        Self::digest(bytes_to_digest).to_vec()
    }
}

impl HttpDigest for Sha512 {
    fn name(&self) -> &str {
        "SHA-512"
    }
    fn digest_bytes(&self, bytes_to_digest: &[u8]) -> Vec<u8> {
        Self::digest(bytes_to_digest).to_vec()
    }
}
