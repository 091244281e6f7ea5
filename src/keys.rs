use openssl::error::ErrorStack;
use openssl::rsa::Rsa;
use thiserror::Error;

/// Smallest modulus accepted when generating keys. Peers still publishing
/// 1024-bit keys remain verifiable, but nothing smaller is ever created.
pub const MIN_KEY_BITS: u32 = 1024;

/// Modulus size used by `KeyPair::generate`.
pub const DEFAULT_KEY_BITS: u32 = 2048;

/// The types of error which may occur whilst generating a key pair.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyGenerationError {
    /// The requested modulus is smaller than `MIN_KEY_BITS`.
    #[error("RSA modulus of {0} bits is too small")]
    KeySize(u32),
    /// The backend failed, typically because no entropy was available.
    #[error("Key generation failed: {0}")]
    Openssl(#[from] ErrorStack),
}

/// Configuration for generating new key pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyGenConfig {
    bits: u32,
}

impl Default for KeyGenConfig {
    fn default() -> Self {
        KeyGenConfig {
            bits: DEFAULT_KEY_BITS,
        }
    }
}

impl KeyGenConfig {
    /// Creates a new key generation configuration using the default values.
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns the RSA modulus size in bits.
    ///
    /// This is set to 2048 by default.
    pub fn bits(&self) -> u32 {
        self.bits
    }
    /// Controls the RSA modulus size in bits (in-place).
    pub fn set_bits(&mut self, bits: u32) -> &mut Self {
        self.bits = bits;
        self
    }
    /// Controls the RSA modulus size in bits.
    pub fn with_bits(mut self, bits: u32) -> Self {
        self.set_bits(bits);
        self
    }
}

/// A PEM encoded RSA key pair belonging to a single identity.
///
/// The private key is PKCS#1 (`BEGIN RSA PRIVATE KEY`) and the public key is
/// SubjectPublicKeyInfo (`BEGIN PUBLIC KEY`), which is what ActivityPub actors
/// publish as `publicKeyPem`.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    private_key: String,
    public_key: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &"..")
            .field("public_key", &self.public_key)
            .finish()
    }
}

impl KeyPair {
    /// Generates a new key pair using the default configuration.
    pub fn generate() -> Result<Self, KeyGenerationError> {
        Self::generate_with(&KeyGenConfig::default())
    }

    /// Generates a new key pair using OpenSSL's CSPRNG.
    pub fn generate_with(config: &KeyGenConfig) -> Result<Self, KeyGenerationError> {
        if config.bits < MIN_KEY_BITS {
            return Err(KeyGenerationError::KeySize(config.bits));
        }

        let rsa = Rsa::generate(config.bits)?;
        let private_key = String::from_utf8_lossy(&rsa.private_key_to_pem()?).into_owned();
        let public_key = String::from_utf8_lossy(&rsa.public_key_to_pem()?).into_owned();

        info!("Generated {}-bit RSA key pair", config.bits);

        Ok(KeyPair {
            private_key,
            public_key,
        })
    }

    /// Returns the PEM encoded private key.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }
    /// Returns the PEM encoded public key.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }
    /// Splits the pair into `(private_key, public_key)`.
    pub fn into_parts(self) -> (String, String) {
        (self.private_key, self.public_key)
    }
}
