use std::fmt;

use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private, Public};
use openssl::rsa::{Padding, Rsa};
use openssl::sign::{Signer, Verifier};

use crate::{HttpSignature, HttpSignatureSign, HttpSignatureVerify};

/// Name of the only signature scheme supported by this crate.
pub const RSA_SHA256: &str = "rsa-sha256";

/// Implementation of the signing half of the 'rsa-sha256' HTTP signature scheme.
pub struct RsaSha256Sign(PKey<Private>);

impl fmt::Debug for RsaSha256Sign {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("RsaSha256Sign")
    }
}

/// Implementation of the verification half of the 'rsa-sha256' HTTP signature scheme.
pub struct RsaSha256Verify(PKey<Public>);

impl fmt::Debug for RsaSha256Verify {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("RsaSha256Verify")
    }
}

impl RsaSha256Sign {
    /// Create a new instance of the signature scheme using the
    /// provided private key, in either PKCS#1 or PKCS#8 PEM form.
    pub fn new_pem(private_key: &[u8]) -> Result<Self, ErrorStack> {
        let pkey = PKey::private_key_from_pem(private_key)?;
        // Reject non-RSA keys up front rather than at signing time
        pkey.rsa()?;
        Ok(Self(pkey))
    }
    /// Create a new instance of the signature scheme using the
    /// provided PKCS#1 DER private key.
    pub fn new_der(private_key: &[u8]) -> Result<Self, ErrorStack> {
        Ok(Self(PKey::from_rsa(Rsa::private_key_from_der(private_key)?)?))
    }
    /// Derives the matching verification key.
    pub fn verifier(&self) -> Result<RsaSha256Verify, ErrorStack> {
        let der = self.0.public_key_to_der()?;
        Ok(RsaSha256Verify(PKey::public_key_from_der(&der)?))
    }
}

impl RsaSha256Verify {
    /// Create a new instance of the signature scheme using the provided public
    /// key. Both `BEGIN PUBLIC KEY` and `BEGIN RSA PUBLIC KEY` are accepted.
    pub fn new_pem(public_key: &[u8]) -> Result<Self, ErrorStack> {
        let rsa = Rsa::public_key_from_pem(public_key)
            .or_else(|_| Rsa::public_key_from_pem_pkcs1(public_key))?;
        Ok(Self(PKey::from_rsa(rsa)?))
    }
    /// Create a new instance of the signature scheme using the
    /// provided SubjectPublicKeyInfo DER public key.
    pub fn new_der(public_key: &[u8]) -> Result<Self, ErrorStack> {
        Ok(Self(PKey::from_rsa(Rsa::public_key_from_der(public_key)?)?))
    }
}

impl HttpSignature for RsaSha256Sign {
    fn name(&self) -> &str {
        RSA_SHA256
    }
}

impl HttpSignature for RsaSha256Verify {
    fn name(&self) -> &str {
        RSA_SHA256
    }
}

impl HttpSignatureSign for RsaSha256Sign {
    fn http_sign(&self, bytes_to_sign: &[u8]) -> Result<Vec<u8>, ErrorStack> {
        let mut signer = Signer::new(MessageDigest::sha256(), &self.0)?;
        signer.set_rsa_padding(Padding::PKCS1)?;
        signer.sign_oneshot_to_vec(bytes_to_sign)
    }
}

impl HttpSignatureVerify for RsaSha256Verify {
    fn http_verify(&self, bytes_to_verify: &[u8], signature: &[u8]) -> bool {
        let mut verifier = match Verifier::new(MessageDigest::sha256(), &self.0) {
            Ok(verifier) => verifier,
            Err(_) => return false,
        };
        if verifier.set_rsa_padding(Padding::PKCS1).is_err() {
            return false;
        }
        match verifier.verify_oneshot(signature, bytes_to_verify) {
            Ok(valid) => valid,
            Err(e) => {
                info!("rsa-sha256 verification error: {}", e);
                false
            }
        }
    }
}
