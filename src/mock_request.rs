use std::collections::HashMap;
use std::convert::TryInto;
use std::error::Error;
use std::fmt::{self, Display};
use std::io::{BufRead, Write};

use anyhow::Context;
use http::{header::HeaderName, HeaderValue, Method};
use url::Url;

use crate::signing::{host_from_url, path_from_url};
use crate::{ClientRequestLike, Header, HttpDigest, PseudoHeader, RequestLike, ServerRequestLike};

/// Generic error returned when the input to `from_reader` does not look like
/// a HTTP request.
#[derive(Debug)]
pub struct ParseError;

impl Error for ParseError {}
impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Malformed HTTP request")
    }
}

/// A mock request type
#[derive(Debug, Clone, PartialEq)]
pub struct MockRequest {
    method: Method,
    url: Option<Url>,
    path: String,
    headers: HashMap<HeaderName, HeaderValue>,
    body: Option<Vec<u8>>,
}

impl MockRequest {
    /// Returns the method used by this mock request
    pub fn method(&self) -> Method {
        self.method.clone()
    }
    /// Returns the path used by this mock request
    pub fn path(&self) -> &str {
        &self.path
    }
    /// Returns the headers used by this mock request
    pub fn headers(&self) -> impl IntoIterator<Item = (&HeaderName, &HeaderValue)> {
        &self.headers
    }
    /// Returns the body used by this mock request
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Constructs a new mock request. The `Host` header is set from the URL.
    ///
    /// Panics if `url` is not an absolute URL; this type is meant for tests.
    pub fn new(method: Method, url: &str) -> Self {
        let url: Url = url.parse().expect("mock request URL to be absolute");

        let mut res = Self {
            method,
            path: path_from_url(&url),
            url: None,
            headers: Default::default(),
            body: None,
        };
        if let Some(host) = host_from_url(&url) {
            res = res.with_header("Host", &host)
        }
        res.url = Some(url);
        res
    }
    /// Convenience method for setting a header
    ///
    /// Panics if the name or value are not valid in an HTTP header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(
            HeaderName::from_bytes(name.as_bytes()).expect("valid header name"),
            HeaderValue::from_bytes(value.as_bytes()).expect("valid header value"),
        );
        self
    }
    /// Convenience method for removing a header
    pub fn without_header(mut self, name: &str) -> Self {
        if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
            self.headers.remove(&name);
        }
        self
    }
    /// Method for setting a request body
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        let l = body.len();
        self.body = Some(body);
        self.with_header("Content-Length", &l.to_string())
    }

    /// Parse a HTTP request into this mock request object
    pub fn from_reader<R: BufRead>(reader: &mut R) -> Result<Self, Box<dyn Error>> {
        let mut line = String::new();

        // Read request line
        reader.read_line(&mut line)?;
        let mut parts = line.split_ascii_whitespace();

        // Extract method
        let method: Method = parts.next().ok_or(ParseError)?.parse()?;

        // Extract path
        let path: String = parts.next().ok_or(ParseError)?.into();

        // Extract headers
        #[allow(clippy::mutable_key_type)]
        let mut headers = HashMap::new();
        let has_body = loop {
            line.truncate(0);
            if reader.read_line(&mut line)? == 0 {
                break false;
            }
            if line.trim().is_empty() {
                break true;
            }

            let mut parts = line.splitn(2, ':');

            let name_str = parts.next().ok_or(ParseError)?.trim();
            let header_name: HeaderName = name_str
                .parse()
                .with_context(|| format!("{:?}", name_str))?;
            let value_str = parts.next().ok_or(ParseError)?.trim();
            let header_value: HeaderValue = value_str
                .parse()
                .with_context(|| format!("{:?}", value_str))?;
            headers.insert(header_name, header_value);
        };

        let body = if has_body {
            let mut body = Vec::new();
            reader.read_to_end(&mut body)?;
            Some(body)
        } else {
            None
        };

        // Reconstruct the URL from the Host header, so that `host()` works for signing
        let url = headers
            .get(&http::header::HOST)
            .and_then(|host| host.to_str().ok())
            .and_then(|host| format!("https://{}{}", host, path).parse().ok());

        Ok(Self {
            method,
            url,
            path,
            headers,
            body,
        })
    }

    /// Write out this HTTP request in standard format
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), Box<dyn Error>> {
        writeln!(writer, "{} {} HTTP/1.1", self.method.as_str(), self.path)?;
        for (header_name, header_value) in &self.headers {
            writeln!(
                writer,
                "{}: {}",
                header_name.as_str(),
                header_value.to_str()?
            )?;
        }

        if let Some(body) = &self.body {
            writeln!(writer)?;
            writer.write_all(body)?;
        }

        Ok(())
    }
}

impl RequestLike for MockRequest {
    fn header(&self, header: &Header) -> Option<HeaderValue> {
        match header {
            Header::Normal(header_name) => self.headers.get(header_name).cloned(),
            Header::Pseudo(PseudoHeader::RequestTarget) => {
                let method = self.method.as_str().to_ascii_lowercase();
                format!("{} {}", method, self.path).try_into().ok()
            }
        }
    }
}

impl ClientRequestLike for MockRequest {
    fn host(&self) -> Option<String> {
        self.url.as_ref().and_then(host_from_url)
    }
    fn compute_digest(&mut self, digest: &dyn HttpDigest) -> Option<String> {
        self.body.as_ref().map(|b| digest.http_digest(b))
    }
    fn set_header(&mut self, header: HeaderName, value: HeaderValue) {
        self.headers.insert(header, value);
    }
}

impl ServerRequestLike for MockRequest {
    fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use http::header::{DATE, HOST};

    use super::*;
    use crate::{
        build_signature, compute_digest, KeyGenConfig, KeyPair, Sender, SignatureHeader,
        SigningConfig, SigningExt, SimpleKeyProvider, VerificationError, VerifyingConfig,
        VerifyingExt,
    };

    /// Test request as defined in the draft specification:
    /// https://tools.ietf.org/id/draft-cavage-http-signatures-12.html#rfc.appendix.C
    ///
    /// ```text
    /// POST /foo?param=value&pet=dog HTTP/1.1
    /// Host: example.com
    /// Date: Sun, 05 Jan 2014 21:31:40 GMT
    /// Content-Type: application/json
    /// Digest: SHA-256=X48E9qOokqqrvdts8nOJRJN3OWDUoyWxBf7kbu9DBPE=
    /// Content-Length: 18
    ///
    /// {"hello": "world"}
    /// ```
    fn test_request() -> MockRequest {
        MockRequest::new(Method::POST, "http://example.com/foo?param=value&pet=dog")
            .with_header("Date", "Sun, 05 Jan 2014 21:31:40 GMT")
            .with_header("Content-Type", "application/json")
            .with_header(
                "Digest",
                "SHA-256=X48E9qOokqqrvdts8nOJRJN3OWDUoyWxBf7kbu9DBPE=",
            )
            .with_body(r#"{"hello": "world"}"#.as_bytes().into())
    }

    fn alice() -> (Sender, KeyPair) {
        let pair = KeyPair::generate_with(&KeyGenConfig::new().with_bits(1024)).unwrap();
        let sender = Sender::new("https://a.example/users/alice", pair.private_key()).unwrap();
        (sender, pair)
    }

    fn key_provider(pair: &KeyPair) -> SimpleKeyProvider {
        let mut keys = SimpleKeyProvider::default();
        keys.add_pem("https://a.example/users/alice#main-key", pair.public_key())
            .unwrap();
        keys
    }

    #[test]
    fn request_target_includes_query() {
        let req = test_request();
        assert_eq!(
            req.header(&PseudoHeader::RequestTarget.into()).unwrap(),
            "post /foo?param=value&pet=dog"
        );
        assert_eq!(req.header(&HOST.into()).unwrap(), "example.com");
    }

    #[test]
    fn sign_then_verify_draft_request() {
        let (sender, pair) = alice();
        let req = test_request()
            .signed(&SigningConfig::from_sender(&sender))
            .unwrap();

        req.verify(&VerifyingConfig::new(key_provider(&pair)))
            .expect("Signature to be verified correctly");

        // Expect failing validation
        let req = req.with_header("Date", "Sun, 05 Jan 2014 21:31:41 GMT");
        assert!(matches!(
            req.verify(&VerifyingConfig::new(key_provider(&pair))),
            Err(VerificationError::InvalidSignature)
        ));
    }

    #[test]
    fn signature_header_from_build_signature_verifies() {
        let (sender, pair) = alice();
        let date = "Mon, 01 Jan 2024 00:00:00 GMT";
        let digest = compute_digest(b"hello");
        let signature = build_signature(&sender, "https://b.example/inbox", date, &digest).unwrap();

        let req = MockRequest::new(Method::POST, "https://b.example/inbox")
            .with_header("Date", date)
            .with_header("Digest", &digest)
            .with_header("Signature", &signature)
            .with_body(b"hello".to_vec());

        let header = req
            .verify(&VerifyingConfig::new(key_provider(&pair)))
            .unwrap();
        assert_eq!(header, SignatureHeader::parse(&signature).unwrap());
    }

    #[test]
    fn authorization_header_is_accepted() {
        let (sender, pair) = alice();
        let req = test_request()
            .signed(&SigningConfig::from_sender(&sender))
            .unwrap();
        let signature = req
            .header(&crate::SIGNATURE.into())
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        let req = req
            .without_header("Signature")
            .with_header("Authorization", &format!("Signature {}", signature));

        req.verify(&VerifyingConfig::new(key_provider(&pair)))
            .unwrap();
    }

    #[test]
    fn from_reader_round_trip() {
        let (sender, pair) = alice();
        let req = test_request()
            .signed(&SigningConfig::from_sender(&sender))
            .unwrap();

        let mut buf = Vec::new();
        req.write(&mut buf).unwrap();
        let parsed = MockRequest::from_reader(&mut Cursor::new(buf)).unwrap();

        assert_eq!(parsed.header(&DATE.into()), req.header(&DATE.into()));
        assert_eq!(parsed.body(), req.body());
        parsed
            .verify(&VerifyingConfig::new(key_provider(&pair)))
            .unwrap();
    }

    #[test]
    fn from_reader_rejects_garbage() {
        assert!(MockRequest::from_reader(&mut Cursor::new(b"\n".to_vec())).is_err());
        assert!(
            MockRequest::from_reader(&mut Cursor::new(b"POST /inbox HTTP/1.1\nbroken\n".to_vec()))
                .is_err()
        );
    }
}
