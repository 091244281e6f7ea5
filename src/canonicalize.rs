use http::HeaderValue;
use itertools::{Either, Itertools};
use thiserror::Error;

use crate::header::Header;

/// The types of error which may occur whilst computing the canonical "signature string"
/// for a request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CanonicalizeError {
    /// One or more headers required to be part of the signature was not present
    /// on the request.
    #[error("Missing headers required for signature: {0:?}")]
    MissingHeaders(Vec<Header>),
}

/// Base trait for all request types
pub trait RequestLike {
    /// Returns an existing header on the request. Lookups of normal headers are
    /// case-insensitive. The `(request-target)` pseudo-header is synthesized as the
    /// lowercased method, a space, and the path including any query string.
    ///
    /// This method *must* reflect changes made by the `ClientRequestLike::set_header`
    /// method.
    fn header(&self, header: &Header) -> Option<HeaderValue>;

    /// Returns true if this request contains a value for the specified header. If this
    /// returns true, following requests to `header()` for the same name must return a
    /// value.
    fn has_header(&self, header: &Header) -> bool {
        self.header(header).is_some()
    }
}

impl<T: RequestLike> RequestLike for &T {
    fn header(&self, header: &Header) -> Option<HeaderValue> {
        (**self).header(header)
    }
}

/// Extension method for computing the canonical "signature string" of a request.
pub trait CanonicalizeExt {
    /// Compute the canonical representation of this request over the given headers,
    /// in the given order.
    fn canonicalize(&self, headers: &[Header]) -> Result<SignatureString, CanonicalizeError>;
}

/// Opaque struct storing a computed signature string.
///
/// Lines have the form `<name>: <value>` and are joined by a single `\n`, with no
/// trailing newline.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SignatureString {
    content: Vec<u8>,
    pub(crate) headers: Vec<Header>,
}

impl SignatureString {
    /// Creates an empty signature string.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one `<name>: <value>` line.
    pub fn push(&mut self, header: Header, value: &[u8]) {
        if !self.content.is_empty() {
            self.content.push(b'\n');
        }
        self.content.extend(header.as_str().as_bytes());
        self.content.extend(b": ");
        self.content.extend(value);
        self.headers.push(header);
    }

    /// Obtain a view of this signature string as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    /// The headers covered by this signature string, in order.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// The value of the `headers` signature parameter: names joined by spaces.
    pub fn header_list(&self) -> String {
        self.headers.iter().map(Header::as_str).join(" ")
    }
}

impl From<SignatureString> for Vec<u8> {
    fn from(other: SignatureString) -> Self {
        other.content
    }
}

impl<T: RequestLike> CanonicalizeExt for T {
    fn canonicalize(&self, headers: &[Header]) -> Result<SignatureString, CanonicalizeError> {
        // Find value of each header
        let (values, missing_headers): (Vec<_>, Vec<_>) =
            headers.iter().cloned().partition_map(|header| {
                if let Some(header_value) = self.header(&header) {
                    Either::Left((header, header_value))
                } else {
                    Either::Right(header)
                }
            });

        // Check for missing headers
        if !missing_headers.is_empty() {
            return Err(CanonicalizeError::MissingHeaders(missing_headers));
        }

        // Build signature string block
        let mut content = SignatureString::new();
        for (name, value) in values {
            content.push(name, value.as_bytes());
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::mock_request::MockRequest;

    #[test]
    fn lines_in_requested_order_without_trailing_newline() {
        let req = MockRequest::new(Method::POST, "https://b.example/inbox")
            .with_header("Date", "Mon, 01 Jan 2024 00:00:00 GMT");

        let headers: Vec<Header> = vec![
            "date".parse().unwrap(),
            "(request-target)".parse().unwrap(),
            "host".parse().unwrap(),
        ];
        let s = req.canonicalize(&headers).unwrap();

        assert_eq!(
            s.as_bytes(),
            &b"date: Mon, 01 Jan 2024 00:00:00 GMT\n(request-target): post /inbox\nhost: b.example"[..]
        );
        assert_eq!(s.header_list(), "date (request-target) host");
    }

    #[test]
    fn reports_all_missing_headers() {
        let req = MockRequest::new(Method::POST, "https://b.example/inbox");

        let err = req.canonicalize(&Header::delivery_set()).unwrap_err();
        let CanonicalizeError::MissingHeaders(missing) = err;
        let names: Vec<_> = missing.iter().map(Header::as_str).collect();
        assert_eq!(names, ["date", "digest"]);
    }

    #[test]
    fn empty_header_list() {
        let req = MockRequest::new(Method::POST, "https://b.example/inbox");
        assert!(req.canonicalize(&[]).unwrap().as_bytes().is_empty());
    }
}
