use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use itertools::Itertools;
use thiserror::Error;

use crate::header::Header;

/// The parsed value of a `Signature` header was unusable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SignatureHeaderError {
    /// The header could not be parsed, or lacked a required parameter.
    #[error("Malformed signature header: {0}")]
    MalformedSignatureHeader(String),
}

fn malformed(reason: impl Into<String>) -> SignatureHeaderError {
    SignatureHeaderError::MalformedSignatureHeader(reason.into())
}

/// Splits on commas which are not inside a quoted value.
fn split_params(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;

    for (i, c) in raw.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

/// Returns true if `value` can be placed between the quotes of a signature parameter.
pub(crate) fn is_quotable(value: &str) -> bool {
    !value.chars().any(|c| c == '"' || c.is_control())
}

/// The structured contents of a `Signature` header:
///
/// ```text
/// keyId="https://a.example/users/alice#main-key",algorithm="rsa-sha256",headers="(request-target) host date digest",signature="..."
/// ```
///
/// The order of `headers` fixes the line order of the canonical signature string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    key_id: String,
    algorithm: Option<String>,
    headers: Vec<Header>,
    signature: Vec<u8>,
}

impl SignatureHeader {
    /// Assembles a signature header from its parts.
    pub fn new(
        key_id: impl Into<String>,
        algorithm: Option<String>,
        headers: Vec<Header>,
        signature: Vec<u8>,
    ) -> Self {
        SignatureHeader {
            key_id: key_id.into(),
            algorithm,
            headers,
            signature,
        }
    }

    /// Parses the value of a `Signature` header. The `Signature ` auth-scheme prefix
    /// used by the `Authorization` header variant is tolerated.
    pub fn parse(raw: &str) -> Result<Self, SignatureHeaderError> {
        let raw = raw.trim();
        let raw = match raw.split_once(' ') {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("Signature") => rest,
            _ => raw,
        };

        let params = split_params(raw)
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                let mut kv = part.splitn(2, '=');
                let k = kv.next()?.trim();
                let v = kv.next()?.trim().trim_matches('"');
                Some((k, v))
            })
            .collect::<Option<HashMap<_, _>>>()
            .ok_or_else(|| malformed("expected comma separated key=\"value\" pairs"))?;

        let key_id = params.get("keyId").ok_or_else(|| malformed("missing keyId"))?;
        let headers = params
            .get("headers")
            .ok_or_else(|| malformed("missing headers"))?;
        let signature = params
            .get("signature")
            .ok_or_else(|| malformed("missing signature"))?;

        let headers = headers
            .split_ascii_whitespace()
            .map(|name| {
                name.parse::<Header>()
                    .map_err(|_| malformed(format!("invalid header name {:?}", name)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let signature = STANDARD
            .decode(signature)
            .map_err(|e| malformed(format!("signature is not base64: {}", e)))?;

        Ok(SignatureHeader {
            key_id: (*key_id).to_owned(),
            algorithm: params.get("algorithm").map(|a| (*a).to_owned()),
            headers,
            signature,
        })
    }

    /// Identifies the signer and which of their keys was used.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
    /// The declared signature algorithm, if any.
    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }
    /// The signed headers, in signing order.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }
    /// The raw signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

impl FromStr for SignatureHeader {
    type Err = SignatureHeaderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SignatureHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, r#"keyId="{}","#, self.key_id)?;
        if let Some(algorithm) = &self.algorithm {
            write!(f, r#"algorithm="{}","#, algorithm)?;
        }
        write!(
            f,
            r#"headers="{}",signature="{}""#,
            self.headers.iter().map(Header::as_str).join(" "),
            STANDARD.encode(&self.signature)
        )
    }
}
