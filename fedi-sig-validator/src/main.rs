use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use fedi_sig::mock_request::MockRequest;
use fedi_sig::{
    compute_digest, CanonicalizeExt, Header, KeyGenConfig, KeyPair, RsaSha256Sign,
    RsaSha256Verify, SigningConfig, SigningExt, VerifyingConfig, VerifyingExt, RSA_SHA256,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
enum Mode {
    /// Generate a PEM key pair and print it to stdout.
    Keygen,
    /// Print the `Digest` header value for the body of the request on stdin.
    Digest,
    /// Print the canonical signature string for the request on stdin.
    Canonicalize,
    /// Sign the request on stdin and print it.
    Sign,
    /// Verify the request on stdin, exiting with an error on failure.
    Verify,
}

#[derive(Debug, StructOpt)]
#[structopt(about = "Signs and verifies federation requests read from stdin.")]
struct Opt {
    #[structopt(subcommand)]
    mode: Mode,

    /// A list of header names, optionally quoted
    #[structopt(short = "d", long, global = true)]
    headers: Option<String>,

    /// A Key Id string.
    #[structopt(short, long = "keyId", global = true)]
    key_id: Option<String>,

    /// A private key file name filename.
    #[structopt(short, long, parse(from_os_str), global = true)]
    private_key: Option<PathBuf>,

    /// A public key file name filename.
    #[structopt(short = "u", long, parse(from_os_str), global = true)]
    public_key: Option<PathBuf>,

    /// Only rsa-sha256 is supported.
    #[structopt(short, long, global = true)]
    algorithm: Option<String>,

    /// RSA modulus size for keygen.
    #[structopt(short, long, global = true, default_value = "2048")]
    bits: u32,

    /// Reject requests whose signed Date is further than this many seconds from now.
    #[structopt(long, global = true)]
    max_skew: Option<u64>,
}

impl Opt {
    fn parse_headers(&self) -> Result<Option<Vec<Header>>, Box<dyn Error>> {
        Ok(if let Some(headers) = &self.headers {
            let headers: Vec<Header> = headers
                .trim_matches('"')
                .split_ascii_whitespace()
                .map(|s| s.parse::<Header>().with_context(|| format!("{:?}", s)))
                .collect::<Result<_, _>>()?;
            Some(headers)
        } else {
            None
        })
    }
    fn check_algorithm(&self) -> Result<(), Box<dyn Error>> {
        match self.algorithm.as_deref() {
            Some(RSA_SHA256) | Some("hs2019") | None => Ok(()),
            Some(other) => Err(anyhow!("Unknown algorithm: {}", other).into()),
        }
    }
    fn signing_config(&self) -> Result<SigningConfig, Box<dyn Error>> {
        self.check_algorithm()?;

        let key_id = self
            .key_id
            .clone()
            .ok_or_else(|| anyhow!("--keyId is required for signing"))?;
        let key_path = self
            .private_key
            .as_ref()
            .ok_or_else(|| anyhow!("--private-key is required for signing"))?;
        let key = RsaSha256Sign::new_pem(&fs::read(key_path)?)
            .with_context(|| format!("reading {}", key_path.display()))?;

        let mut config = SigningConfig::new(&key_id, key);
        if let Some(headers) = self.parse_headers()? {
            config.set_headers(&headers);
        }

        Ok(config)
    }
    fn verification_config(&self) -> Result<VerifyingConfig, Box<dyn Error>> {
        self.check_algorithm()?;

        let key_path = self
            .public_key
            .as_ref()
            .ok_or_else(|| anyhow!("--public-key is required for verification"))?;
        let key = Arc::new(
            RsaSha256Verify::new_pem(&fs::read(key_path)?)
                .with_context(|| format!("reading {}", key_path.display()))?,
        );

        // Without an explicit key ID the single key given is trusted for any signer
        let expected_key_id = self.key_id.clone();
        let mut config = VerifyingConfig::new(move |key_id: &str| match &expected_key_id {
            Some(expected) if expected != key_id => None,
            _ => Some(key.clone()),
        });

        if let Some(headers) = self.parse_headers()? {
            config.set_required_headers(&headers);
        }
        config.set_date_leeway(self.max_skew.map(Duration::from_secs));

        Ok(config)
    }
}

fn read_request() -> Result<MockRequest, Box<dyn Error>> {
    let req = MockRequest::from_reader(&mut io::stdin().lock())?;
    log::info!("{:?}", req);
    Ok(req)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let opt = Opt::from_args();

    match opt.mode {
        Mode::Keygen => {
            let pair = KeyPair::generate_with(&KeyGenConfig::new().with_bits(opt.bits))?;
            let mut stdout = io::stdout();
            stdout.write_all(pair.private_key().as_bytes())?;
            stdout.write_all(pair.public_key().as_bytes())?;
        }
        Mode::Digest => {
            let req = read_request()?;
            println!("{}", compute_digest(req.body().unwrap_or_default()));
        }
        Mode::Canonicalize => {
            let req = read_request()?;
            let headers = opt.parse_headers()?.unwrap_or_else(Header::delivery_set);
            let res = req.canonicalize(&headers)?;
            io::stdout().lock().write_all(res.as_bytes())?;
        }
        Mode::Sign => {
            let mut req = read_request()?;
            req.sign(&opt.signing_config()?)?;
            req.write(&mut io::stdout().lock())?;
        }
        Mode::Verify => {
            let req = read_request()?;
            let signature = req.verify(&opt.verification_config()?)?;
            log::info!("Verified signature from {}", signature.key_id());
        }
    }

    Ok(())
}
