#![deny(missing_docs)]
//! HTTP message signatures for server-to-server federation, following the IETF draft
//! 'Signing HTTP Messages' as deployed between ActivityPub servers:
//! https://tools.ietf.org/id/draft-cavage-http-signatures-12.html
//!
//! A sending server signs `(request-target) host date digest` with the RSA key of the
//! acting user and attaches a `Signature` header. The receiving server rebuilds the same
//! signature string from the request it received, checks the body against the `Digest`
//! header, and verifies the signature with the sender's public key.
//!
//! Fetching and caching public keys, and transporting requests, are left to the caller.
//!
//! ### Supported signature algorithms:
//!
//! - `rsa-sha256` (RSASSA-PKCS1-v1_5 over SHA-256)
//!
//! ### Supported digest algorithms:
//!
//! Digest registry: https://www.iana.org/assignments/http-dig-alg/http-dig-alg.xhtml
//!
//! - `SHA-256`
//! - `SHA-512`
//!
//! ## Example usage
//!
//! ```rust,no_run
//! use fedi_sig::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let alice = KeyPair::generate()?;
//! let sender = Sender::new("https://a.example/users/alice", alice.private_key())?;
//!
//! let body = br#"{"type":"Follow"}"#;
//! let date = "Mon, 01 Jan 2024 00:00:00 GMT";
//! let digest = compute_digest(body);
//! let signature = build_signature(&sender, "https://b.example/inbox", date, &digest)?;
//!
//! // ... on the receiving side
//! let request = http::Request::post("https://b.example/inbox")
//!     .header("Host", "b.example")
//!     .header("Date", date)
//!     .header("Digest", &digest)
//!     .body(body.to_vec())?;
//! let parsed = SignatureHeader::parse(&signature)?;
//! verify(alice.public_key(), &parsed, &request)?;
//! # Ok(())
//! # }
//! ```

use sha2::Sha256;

const DATE_FORMAT: &str = "%a, %d %b %Y %T GMT";
type DefaultDigestAlgorithm = Sha256;

#[macro_use]
mod macros;

mod algorithm;
pub use algorithm::*;

mod keys;
pub use keys::*;

mod digest;
pub use digest::*;

mod header;
pub use header::*;

mod canonicalize;
pub use canonicalize::*;

mod signature_header;
pub use signature_header::*;

mod signing;
pub use signing::*;

mod verifying;
pub use verifying::*;

mod http_impls;

/// Module containg a mock request type which implements both
/// `ClientRequestLike` and `ServerRequestLike` for testing.
pub mod mock_request;
