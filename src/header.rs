use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use http::header::{HeaderName, InvalidHeaderName, DATE, HOST};

/// The `Digest` header, which `http` does not define a constant for.
pub const DIGEST: HeaderName = HeaderName::from_static("digest");

/// The `Signature` header, which `http` does not define a constant for.
pub const SIGNATURE: HeaderName = HeaderName::from_static("signature");

/// Headers which are synthesized from the request rather than sent on the wire.
#[derive(Debug, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PseudoHeader {
    /// `(request-target)`: the lowercased method followed by the request path.
    RequestTarget,
}

impl PseudoHeader {
    /// Returns the name as it appears in the `headers` list of a signature.
    pub fn as_str(&self) -> &str {
        match self {
            PseudoHeader::RequestTarget => "(request-target)",
        }
    }
}

impl FromStr for PseudoHeader {
    type Err = ();
    fn from_str(s: &str) -> Result<PseudoHeader, Self::Err> {
        match s {
            "(request-target)" => Ok(PseudoHeader::RequestTarget),
            _ => Err(()),
        }
    }
}

/// A header which may take part in the canonical signature string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Header {
    /// A pseudo-header such as `(request-target)`.
    Pseudo(PseudoHeader),
    /// A regular HTTP header. Names are always lowercase.
    Normal(HeaderName),
}

impl Header {
    /// Returns the lowercase name of this header.
    pub fn as_str(&self) -> &str {
        match self {
            Header::Pseudo(h) => h.as_str(),
            Header::Normal(h) => h.as_str(),
        }
    }

    /// The header list signed by default for an outgoing delivery:
    /// `(request-target) host date digest`.
    pub fn delivery_set() -> Vec<Header> {
        vec![
            Header::Pseudo(PseudoHeader::RequestTarget),
            Header::Normal(HOST),
            Header::Normal(DATE),
            Header::Normal(DIGEST),
        ]
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Header {
    type Err = InvalidHeaderName;
    fn from_str(s: &str) -> Result<Header, Self::Err> {
        PseudoHeader::from_str(s)
            .map(Into::into)
            .or_else(|_| HeaderName::from_str(s).map(Into::into))
    }
}

impl Ord for Header {
    fn cmp(&self, other: &Header) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for Header {
    fn partial_cmp(&self, other: &Header) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<HeaderName> for Header {
    fn from(other: HeaderName) -> Self {
        Header::Normal(other)
    }
}

impl From<PseudoHeader> for Header {
    fn from(other: PseudoHeader) -> Self {
        Header::Pseudo(other)
    }
}
