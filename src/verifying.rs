use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeZone, Utc};
use http::header::{AUTHORIZATION, DATE};
use openssl::error::ErrorStack;
use thiserror::Error;

use crate::algorithm::{HttpSignatureVerify, RsaSha256Verify, RSA_SHA256};
use crate::canonicalize::{RequestLike, SignatureString};
use crate::digest::{verify_digest_with, DefaultDigestProvider, DigestError, DigestProvider};
use crate::header::{Header, DIGEST, SIGNATURE};
use crate::signature_header::{SignatureHeader, SignatureHeaderError};
use crate::DATE_FORMAT;

/// This error indicates that we failed to verify the request. As a result
/// the request should be rejected, never partially processed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VerificationError {
    /// The request carries neither a `Signature` header nor a `Signature`
    /// `Authorization` header.
    #[error("Request is not signed")]
    NotSigned,
    /// The signature header could not be parsed.
    #[error(transparent)]
    MalformedSignatureHeader(#[from] SignatureHeaderError),
    /// The signature declares an algorithm other than `rsa-sha256`.
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedSignatureAlgorithm(String),
    /// A header listed in the signature is not present on the request.
    #[error("Signed header missing from request: {0}")]
    MissingHeader(Header),
    /// The configuration requires a header which the signature does not cover.
    #[error("Header {0} must be covered by the signature")]
    MissingRequiredHeader(Header),
    /// The signed `Digest` header does not match the body, or cannot be checked.
    #[error(transparent)]
    Digest(#[from] DigestError),
    /// The public key could not be parsed as a PEM RSA key.
    #[error("Malformed public key: {0}")]
    MalformedKey(#[source] ErrorStack),
    /// The key provider does not know the key ID.
    #[error("No key found for key ID {0:?}")]
    UnknownKey(String),
    /// The signature does not match the canonical signature string.
    #[error("Invalid signature")]
    InvalidSignature,
    /// The signed `Date` header is not an HTTP date.
    #[error("Invalid date header: {0:?}")]
    InvalidDate(String),
    /// The signed `Date` header is outside the configured leeway.
    #[error("Signed date is outside the accepted window")]
    StaleDate,
}

/// This trait is to be implemented for types representing an incoming
/// HTTP request. The HTTP verification extension methods are available on
/// any type implementing this trait.
pub trait ServerRequestLike: RequestLike {
    /// Returns the request body, or `None` if the request has no body. A missing
    /// body digests the same as an empty one.
    fn body(&self) -> Option<&[u8]>;
}

impl<T: ServerRequestLike> ServerRequestLike for &T {
    fn body(&self) -> Option<&[u8]> {
        (**self).body()
    }
}

/// The verification process will use this trait to find the key to use for verifying
/// a request. It is passed in explicitly so that key lookup (and any fetching or caching
/// behind it) stays under the caller's control.
///
/// You do not need to implement this yourself: the `SimpleKeyProvider` type provides a
/// key store that should be suitable for many situations, and closures of type
/// `Fn(&str) -> Option<Arc<RsaSha256Verify>>` are accepted too.
pub trait KeyProvider: Send + Sync + 'static {
    /// Given the key ID, return the matching key, or `None` if the key ID is unknown.
    fn provide_key(&self, key_id: &str) -> Option<Arc<RsaSha256Verify>>;
}

impl<F> KeyProvider for F
where
    F: Fn(&str) -> Option<Arc<RsaSha256Verify>> + Send + Sync + 'static,
{
    fn provide_key(&self, key_id: &str) -> Option<Arc<RsaSha256Verify>> {
        self(key_id)
    }
}

/// Implementation of a simple key store, holding exactly one key per key ID.
#[derive(Debug, Default, Clone)]
pub struct SimpleKeyProvider {
    keys: HashMap<String, Arc<RsaSha256Verify>>,
}

impl SimpleKeyProvider {
    /// Initializes the key store from a list of key IDs and keys.
    pub fn new<I, S, K>(key_iter: I) -> Self
    where
        I: IntoIterator<Item = (S, K)>,
        S: Into<String>,
        K: Into<Arc<RsaSha256Verify>>,
    {
        let keys = key_iter
            .into_iter()
            .map(|(key_id, key)| (key_id.into(), key.into()))
            .collect();
        Self { keys }
    }

    /// Adds a key to the key store, replacing any key with the same ID.
    pub fn add<K: Into<Arc<RsaSha256Verify>>>(&mut self, key_id: &str, key: K) {
        self.keys.insert(key_id.into(), key.into());
    }
    /// Parses and adds a PEM encoded public key to the key store.
    pub fn add_pem(&mut self, key_id: &str, public_key: &str) -> Result<(), ErrorStack> {
        let key = RsaSha256Verify::new_pem(public_key.as_bytes())?;
        self.add(key_id, key);
        Ok(())
    }
    /// Clears all keys from the key store
    pub fn clear(&mut self) {
        self.keys.clear();
    }
    /// Removes the key with the specified key ID from the key store
    pub fn remove(&mut self, key_id: &str) {
        self.keys.remove(key_id);
    }
}

impl KeyProvider for SimpleKeyProvider {
    fn provide_key(&self, key_id: &str) -> Option<Arc<RsaSha256Verify>> {
        self.keys.get(key_id).cloned()
    }
}

/// The configuration used for verifying HTTP requests with `VerifyingExt`.
#[derive(Clone)]
pub struct VerifyingConfig {
    key_provider: Arc<dyn KeyProvider>,
    digest_provider: Arc<dyn DigestProvider>,
    required_headers: Vec<Header>,
    date_leeway: Option<Duration>,
}

impl fmt::Debug for VerifyingConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VerifyingConfig")
            .field("digest_provider", &self.digest_provider)
            .field("required_headers", &self.required_headers)
            .field("date_leeway", &self.date_leeway)
            .finish()
    }
}

impl VerifyingConfig {
    /// Creates a new verifying configuration using the given key provider.
    pub fn new<KP: KeyProvider>(key_provider: KP) -> Self {
        VerifyingConfig {
            key_provider: Arc::new(key_provider),
            digest_provider: Arc::new(DefaultDigestProvider),
            required_headers: Vec::new(),
            date_leeway: None,
        }
    }

    /// Returns the key provider.
    pub fn key_provider(&self) -> &dyn KeyProvider {
        &*self.key_provider
    }
    /// Returns the digest provider.
    pub fn digest_provider(&self) -> &dyn DigestProvider {
        &*self.digest_provider
    }
    /// Sets the digest provider (in-place).
    pub fn set_digest_provider<DP: DigestProvider>(
        &mut self,
        digest_provider: DP,
    ) -> &mut Self {
        self.digest_provider = Arc::new(digest_provider);
        self
    }
    /// Sets the digest provider.
    pub fn with_digest_provider<DP: DigestProvider>(mut self, digest_provider: DP) -> Self {
        self.set_digest_provider(digest_provider);
        self
    }
    /// Returns the list of headers that *must* be included in every request's signature.
    ///
    /// This list is empty by default.
    pub fn required_headers(&self) -> &[Header] {
        &self.required_headers
    }
    /// Controls the list of headers that *must* be included in every request's
    /// signature (in-place).
    pub fn set_required_headers(&mut self, required_headers: &[Header]) -> &mut Self {
        self.required_headers = required_headers.to_vec();
        self
    }
    /// Controls the list of headers that *must* be included in every request's
    /// signature.
    pub fn with_required_headers(mut self, required_headers: &[Header]) -> Self {
        self.set_required_headers(required_headers);
        self
    }
    /// Returns the amount of leeway allowed in either direction when comparing the
    /// signed `Date` header against the current date and time. `None` disables the
    /// check.
    ///
    /// This is `None` by default.
    pub fn date_leeway(&self) -> Option<Duration> {
        self.date_leeway
    }
    /// Controls the date leeway (in-place). When set, the `Date` header must be
    /// covered by the signature.
    pub fn set_date_leeway(&mut self, date_leeway: Option<Duration>) -> &mut Self {
        self.date_leeway = date_leeway;
        self
    }
    /// Controls the date leeway. When set, the `Date` header must be covered by the
    /// signature.
    pub fn with_date_leeway(mut self, date_leeway: Option<Duration>) -> Self {
        self.set_date_leeway(date_leeway);
        self
    }
}

/// Verifies `signature` against `request` using a PEM encoded RSA public key.
///
/// The canonical signature string is rebuilt from the request in the order given by
/// `signature.headers()`. When `digest` is among them, the body is checked against it
/// before the signature itself.
pub fn verify<R: ServerRequestLike + ?Sized>(
    public_key: &str,
    signature: &SignatureHeader,
    request: &R,
) -> Result<(), VerificationError> {
    let key = RsaSha256Verify::new_pem(public_key.as_bytes())
        .map_err(VerificationError::MalformedKey)?;
    verify_with_key(&key, signature, request)
}

/// Like `verify`, with an already parsed key.
pub fn verify_with_key<R: ServerRequestLike + ?Sized>(
    key: &RsaSha256Verify,
    signature: &SignatureHeader,
    request: &R,
) -> Result<(), VerificationError> {
    verify_inner(key, &DefaultDigestProvider, signature, request)
}

fn verify_inner<R: ServerRequestLike + ?Sized>(
    key: &RsaSha256Verify,
    digest_provider: &dyn DigestProvider,
    signature: &SignatureHeader,
    request: &R,
) -> Result<(), VerificationError> {
    match signature.algorithm() {
        None => {}
        Some(name) if name.eq_ignore_ascii_case(RSA_SHA256) || name == "hs2019" => {}
        Some(other) => {
            return Err(VerificationError::UnsupportedSignatureAlgorithm(
                other.to_owned(),
            ))
        }
    }

    let content = signature_string(digest_provider, signature, request)?;

    if key.http_verify(content.as_bytes(), signature.signature()) {
        Ok(())
    } else {
        info!("Invalid signature for key {:?}", signature.key_id());
        Err(VerificationError::InvalidSignature)
    }
}

/// Rebuilds the canonical signature string in a single pass over the signed headers.
fn signature_string<R: ServerRequestLike + ?Sized>(
    digest_provider: &dyn DigestProvider,
    signature: &SignatureHeader,
    request: &R,
) -> Result<SignatureString, VerificationError> {
    let digest_header = Header::Normal(DIGEST);
    let mut content = SignatureString::new();

    for header in signature.headers() {
        let value = request
            .header(header)
            .ok_or_else(|| VerificationError::MissingHeader(header.clone()))?;

        if *header == digest_header {
            let declared = value
                .to_str()
                .map_err(|_| DigestError::MalformedDigest(format!("{:?}", value)))?;
            verify_digest_with(digest_provider, declared, request.body().unwrap_or_default())?;
        }

        content.push(header.clone(), value.as_bytes());
    }

    Ok(content)
}

/// Checks an HTTP date against the current time, allowing `leeway` in either direction.
///
/// This is the freshness check `VerifyingExt` applies when a date leeway is configured;
/// callers verifying with `verify` directly can apply it to the signed `Date` header
/// themselves.
pub fn check_date(date: &str, leeway: Duration) -> Result<(), VerificationError> {
    let provided_date = NaiveDateTime::parse_from_str(date, DATE_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| VerificationError::InvalidDate(date.to_owned()))?;

    // Compute the absolute difference between the provided date and now.
    let chrono_delta = provided_date.signed_duration_since(Utc::now());
    let delta = chrono_delta
        .to_std()
        .or_else(|_| (-chrono_delta).to_std())
        .map_err(|_| VerificationError::StaleDate)?;

    if delta > leeway {
        debug!("Date {:?} is {:?} away from now", date, delta);
        return Err(VerificationError::StaleDate);
    }

    Ok(())
}

/// Import this trait to get access to the `verify` method on all types implementing
/// `ServerRequestLike`.
pub trait VerifyingExt {
    /// Verify the request using the given verification configuration. On success the
    /// parsed signature header is returned, so the caller knows which key ID signed it.
    fn verify(&self, config: &VerifyingConfig) -> Result<SignatureHeader, VerificationError>;
}

impl<T: ServerRequestLike> VerifyingExt for T {
    fn verify(&self, config: &VerifyingConfig) -> Result<SignatureHeader, VerificationError> {
        let raw = self
            .header(&SIGNATURE.into())
            .or_else(|| {
                self.header(&AUTHORIZATION.into())
                    .filter(|v| v.as_bytes().starts_with(b"Signature "))
            })
            .ok_or(VerificationError::NotSigned)?;
        let raw = raw.to_str().map_err(|_| {
            SignatureHeaderError::MalformedSignatureHeader("not visible ASCII".into())
        })?;
        let signature = SignatureHeader::parse(raw)?;

        // Check that all the required headers are signed
        for header in &config.required_headers {
            if !signature.headers().contains(header) {
                return Err(VerificationError::MissingRequiredHeader(header.clone()));
            }
        }

        // Find the appropriate key
        let key = config
            .key_provider
            .provide_key(signature.key_id())
            .ok_or_else(|| VerificationError::UnknownKey(signature.key_id().to_owned()))?;

        verify_inner(&key, &*config.digest_provider, &signature, self)?;

        // If we are expected to validate the date, it must have been signed
        if let Some(leeway) = config.date_leeway {
            let date_header = Header::Normal(DATE);
            if !signature.headers().contains(&date_header) {
                return Err(VerificationError::MissingRequiredHeader(date_header));
            }
            let date_value = self
                .header(&date_header)
                .ok_or_else(|| VerificationError::MissingHeader(date_header.clone()))?;
            let date_value = date_value
                .to_str()
                .map_err(|_| VerificationError::InvalidDate(format!("{:?}", date_value)))?;
            check_date(date_value, leeway)?;
        }

        Ok(signature)
    }
}
