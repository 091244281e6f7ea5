use std::convert::TryInto;

use http::header::{HeaderName, HeaderValue};
use http::uri::Scheme;
use http::{Request, Uri};

use super::*;

/// Returns the correct `Host` header value for a given URI, in the form `<host>[:<port>]`.
/// The port is omitted when it is the default for the scheme.
fn host_from_uri(uri: &Uri) -> Option<String> {
    let host = uri.host()?;
    let default_port = match uri.scheme() {
        Some(scheme) if *scheme == Scheme::HTTPS => Some(443),
        Some(scheme) if *scheme == Scheme::HTTP => Some(80),
        _ => None,
    };
    Some(match uri.port_u16() {
        Some(port) if Some(port) != default_port => format!("{}:{}", host, port),
        _ => host.into(),
    })
}

impl<B> RequestLike for Request<B> {
    fn header(&self, header: &Header) -> Option<HeaderValue> {
        match header {
            Header::Normal(header_name) => self.headers().get(header_name).cloned(),
            Header::Pseudo(PseudoHeader::RequestTarget) => {
                let method = self.method().as_str().to_ascii_lowercase();
                let path = self
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                format!("{} {}", method, path).try_into().ok()
            }
        }
    }
}

impl<B: AsRef<[u8]>> ClientRequestLike for Request<B> {
    fn host(&self) -> Option<String> {
        host_from_uri(self.uri())
    }
    fn compute_digest(&mut self, digest: &dyn HttpDigest) -> Option<String> {
        Some(digest.http_digest(self.body().as_ref()))
    }
    fn set_header(&mut self, header: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(header, value);
    }
}

impl<B: AsRef<[u8]>> ServerRequestLike for Request<B> {
    fn body(&self) -> Option<&[u8]> {
        Some(Request::body(self).as_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::header::{CONTENT_TYPE, DATE, HOST};
    use http::Method;

    use super::*;

    fn key_pair() -> KeyPair {
        KeyPair::generate_with(&KeyGenConfig::new().with_bits(1024)).unwrap()
    }

    fn activity() -> Request<Vec<u8>> {
        Request::builder()
            .method(Method::POST)
            .uri("https://b.example/users/bob/inbox")
            .header(CONTENT_TYPE, "application/activity+json")
            .body(br#"{"type":"Follow"}"#.to_vec())
            .unwrap()
    }

    #[test]
    fn it_works() {
        let pair = key_pair();
        let sender = Sender::new("https://a.example/users/alice", pair.private_key()).unwrap();

        let req = activity().signed(&SigningConfig::from_sender(&sender)).unwrap();

        assert_eq!(req.headers().get(HOST).unwrap(), "b.example");
        assert_eq!(
            req.headers().get(DIGEST).unwrap(),
            compute_digest(br#"{"type":"Follow"}"#).as_str()
        );
        assert!(req.headers().contains_key(DATE));

        let mut keys = SimpleKeyProvider::default();
        keys.add_pem(&sender.key_id(), pair.public_key()).unwrap();
        let config = VerifyingConfig::new(keys).with_date_leeway(Some(Duration::from_secs(30)));
        req.verify(&config).unwrap();
    }

    #[test]
    fn tampered_body_is_rejected() {
        let pair = key_pair();
        let sender = Sender::new("https://a.example/users/alice", pair.private_key()).unwrap();

        let req = activity()
            .signed(&SigningConfig::from_sender(&sender))
            .unwrap()
            .map(|_| br#"{"type":"Delete"}"#.to_vec());

        let mut keys = SimpleKeyProvider::default();
        keys.add_pem(&sender.key_id(), pair.public_key()).unwrap();
        assert!(matches!(
            req.verify(&VerifyingConfig::new(keys)),
            Err(VerificationError::Digest(DigestError::DigestMismatch))
        ));
    }

    #[test]
    fn sets_host_header_with_port_correctly() {
        let uri: Uri = "http://localhost:8080/inbox".parse().unwrap();
        assert_eq!(host_from_uri(&uri).unwrap(), "localhost:8080");
        let uri: Uri = "https://b.example:443/inbox".parse().unwrap();
        assert_eq!(host_from_uri(&uri).unwrap(), "b.example");
    }
}
