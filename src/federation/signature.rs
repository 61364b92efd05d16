//! HTTP Signatures for ActivityPub
//!
//! Key pair generation plus signing and verification of requests per
//! draft-cavage-http-signatures, as deployed across the fediverse:
//! https://docs.joinmastodon.org/spec/security/

use crate::error::AppError;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use http::HeaderMap;
use rsa::pkcs1v15::{Signature as Pkcs1v15Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

/// Headers covered by every outbound signature, in signing order
pub const OUTBOUND_SIGNED_HEADERS: [&str; 4] = ["(request-target)", "host", "date", "digest"];

/// Maximum accepted difference between the Date header and now
const MAX_DATE_SKEW_SECS: i64 = 300;

/// RSA key pair in PEM form
#[derive(Clone)]
pub struct KeyPair {
    /// SubjectPublicKeyInfo PEM
    pub public_key_pem: String,
    /// PKCS#8 PEM
    pub private_key_pem: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key_pem", &self.public_key_pem)
            .field("private_key_pem", &"<redacted>")
            .finish()
    }
}

/// Signature algorithms accepted in the `algorithm` parameter.
///
/// Both resolve to RSASSA-PKCS1-v1_5 with SHA-256; `hs2019` is how newer
/// servers label the same RSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    RsaSha256,
    Hs2019,
}

impl SignatureAlgorithm {
    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rsa-sha256" => Ok(Self::RsaSha256),
            "hs2019" => Ok(Self::Hs2019),
            other => Err(AppError::Validation(format!(
                "Unsupported signature algorithm: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RsaSha256 => "rsa-sha256",
            Self::Hs2019 => "hs2019",
        }
    }
}

/// Generate a new RSA key pair.
///
/// CPU heavy; async callers should run this on `spawn_blocking`.
pub fn generate_key_pair(bits: usize) -> Result<KeyPair, AppError> {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| AppError::Crypto(format!("Failed to generate RSA key: {}", e)))?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AppError::Crypto(format!("Failed to encode private key: {}", e)))?
        .to_string();
    let public_key_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| AppError::Crypto(format!("Failed to encode public key: {}", e)))?;

    Ok(KeyPair {
        public_key_pem,
        private_key_pem,
    })
}

/// Generate SHA-256 digest for body
///
/// # Returns
/// `SHA-256=base64(hash)`
pub fn compute_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    let hash = hasher.finalize();
    format!("SHA-256={}", BASE64.encode(hash))
}

/// Path and query of a request target.
///
/// Accepts a full URL or an already-relative path.
fn path_and_query(target: &str) -> String {
    match url::Url::parse(target) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        },
        Err(_) => target.to_string(),
    }
}

/// Host header value for a URL: host plus explicit non-default port
pub fn host_header_value(url: &url::Url) -> Result<String, AppError> {
    let host = url
        .host_str()
        .ok_or_else(|| AppError::Validation("Missing host in URL".to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Build the string that gets signed.
///
/// One `name: value` line per entry of `header_names`, in order.
/// `(request-target)` expands to `<method-lowercase> <path[?query]>`.
/// Header lookup is case-insensitive.
///
/// # Errors
/// `Validation` when a named header is absent or not valid text
pub fn build_signing_string(
    headers: &HeaderMap,
    header_names: &[&str],
    method: &str,
    target: &str,
) -> Result<String, AppError> {
    let mut lines = Vec::with_capacity(header_names.len());

    for name in header_names {
        let name = name.to_ascii_lowercase();
        let value = if name == "(request-target)" {
            format!("{} {}", method.to_lowercase(), path_and_query(target))
        } else {
            headers
                .get(name.as_str())
                .ok_or_else(|| AppError::Validation(format!("Missing {} header", name)))?
                .to_str()
                .map_err(|_| AppError::Validation(format!("Invalid {} header", name)))?
                .to_string()
        };
        lines.push(format!("{}: {}", name, value));
    }

    Ok(lines.join("\n"))
}

/// Sign a signing string with a PKCS#8 private key.
///
/// # Returns
/// Base64-encoded signature
pub fn sign(
    signing_string: &str,
    private_key_pem: &str,
    _algorithm: SignatureAlgorithm,
) -> Result<String, AppError> {
    let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| AppError::Crypto(format!("Invalid private key: {}", e)))?;

    let signing_key = SigningKey::<Sha256>::new(private_key);
    let mut rng = rand::thread_rng();
    let signature = signing_key.sign_with_rng(&mut rng, signing_string.as_bytes());

    Ok(BASE64.encode(signature.to_bytes()))
}

/// Verify a base64 signature over a signing string.
///
/// Returns `Ok(false)` on mismatch or an undecodable signature.
///
/// # Errors
/// `Crypto` when the public key cannot be parsed
pub fn verify(
    signing_string: &str,
    signature_b64: &str,
    public_key_pem: &str,
    _algorithm: SignatureAlgorithm,
) -> Result<bool, AppError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| AppError::Crypto(format!("Invalid public key: {}", e)))?;
    let verifier = VerifyingKey::<Sha256>::new(public_key);

    let Ok(signature_bytes) = BASE64.decode(signature_b64.trim()) else {
        return Ok(false);
    };
    let Ok(signature) = Pkcs1v15Signature::try_from(signature_bytes.as_slice()) else {
        return Ok(false);
    };

    Ok(verifier
        .verify(signing_string.as_bytes(), &signature)
        .is_ok())
}

/// Headers to add for signed request
#[derive(Debug, Clone)]
pub struct SignatureHeaders {
    /// Host header value
    pub host: String,
    /// Date header value (RFC 2616)
    pub date: String,
    /// Digest header value
    pub digest: String,
    /// Signature header value
    pub signature: String,
}

/// Sign an outbound HTTP request
///
/// Produces the Host, Date, Digest and Signature headers, signing
/// `(request-target) host date digest`.
///
/// # Example
/// ```ignore
/// let headers = sign_request(
///     "POST",
///     "https://remote.server/inbox",
///     &body,
///     &private_key,
///     "https://my.server/users/me#main-key",
/// )?;
/// ```
pub fn sign_request(
    method: &str,
    url: &str,
    body: &[u8],
    private_key_pem: &str,
    key_id: &str,
) -> Result<SignatureHeaders, AppError> {
    let parsed_url =
        url::Url::parse(url).map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;
    let host = host_header_value(&parsed_url)?;

    // RFC 2822 / IMF-fixdate
    let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    let digest = compute_digest(body);

    let mut headers = HeaderMap::new();
    for (name, value) in [("host", &host), ("date", &date), ("digest", &digest)] {
        let value = http::HeaderValue::from_str(value)
            .map_err(|_| AppError::Validation(format!("Invalid {} header value", name)))?;
        headers.insert(name, value);
    }

    let signing_string = build_signing_string(&headers, &OUTBOUND_SIGNED_HEADERS, method, url)?;
    let signature_b64 = sign(&signing_string, private_key_pem, SignatureAlgorithm::RsaSha256)?;

    let signature = format!(
        "keyId=\"{}\",algorithm=\"{}\",headers=\"{}\",signature=\"{}\"",
        key_id,
        SignatureAlgorithm::RsaSha256.as_str(),
        OUTBOUND_SIGNED_HEADERS.join(" "),
        signature_b64
    );

    Ok(SignatureHeaders {
        host,
        date,
        digest,
        signature,
    })
}

/// Verify an inbound HTTP request signature
///
/// Checks the signed header set, Date skew, Digest and finally the RSA
/// signature.
///
/// # Errors
/// - `Unauthorized` when no Signature header is present
/// - `Validation` when the header is malformed
/// - `VerificationFailed` for a stale Date, Digest mismatch or bad signature
/// - `Crypto` when the public key cannot be parsed
pub fn verify_request(
    method: &str,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
    public_key_pem: &str,
) -> Result<(), AppError> {
    let parsed = parse_signature_from_headers(headers)?;
    let algorithm = SignatureAlgorithm::parse(&parsed.algorithm)?;

    for required in ["(request-target)", "host", "date", "digest"] {
        if !parsed.headers.iter().any(|h| h == required) {
            return Err(AppError::Validation(format!(
                "Signed headers must include: {}",
                required
            )));
        }
    }

    let date_str = headers
        .get("date")
        .ok_or_else(|| AppError::Validation("Missing Date header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Validation("Invalid Date header".to_string()))?;
    let date = DateTime::parse_from_rfc2822(date_str)
        .map_err(|_| AppError::Validation("Invalid Date format".to_string()))?;
    if (Utc::now().timestamp() - date.timestamp()).abs() > MAX_DATE_SKEW_SECS {
        tracing::debug!(date = %date_str, "Rejecting request with stale Date header");
        return Err(AppError::VerificationFailed);
    }

    let digest_str = headers
        .get("digest")
        .ok_or_else(|| AppError::Validation("Missing Digest header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Validation("Invalid Digest header".to_string()))?;
    if digest_str != compute_digest(body) {
        tracing::debug!("Rejecting request with mismatched Digest");
        return Err(AppError::VerificationFailed);
    }

    let names: Vec<&str> = parsed.headers.iter().map(String::as_str).collect();
    let signing_string = build_signing_string(headers, &names, method, path)?;

    if verify(&signing_string, &parsed.signature, public_key_pem, algorithm)? {
        Ok(())
    } else {
        Err(AppError::VerificationFailed)
    }
}

fn parse_signature_from_headers(headers: &HeaderMap) -> Result<ParsedSignature, AppError> {
    let signature_header = headers
        .get("signature")
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Validation("Invalid Signature header".to_string()))?;

    parse_signature_header(signature_header)
}

/// Extract keyId from Signature header.
pub fn extract_signature_key_id(headers: &HeaderMap) -> Result<String, AppError> {
    Ok(parse_signature_from_headers(headers)?.key_id)
}

/// Validate that signature keyId points to the same actor as the activity actor.
pub fn key_id_matches_actor(key_id: &str, actor_id: &str) -> bool {
    let key_actor = key_id.split('#').next().unwrap_or(key_id);
    let actor = actor_id.split('#').next().unwrap_or(actor_id);
    key_actor == actor
}

/// Parsed Signature header
#[derive(Debug, Clone)]
pub struct ParsedSignature {
    /// Key ID (URL to public key)
    pub key_id: String,
    /// Algorithm (rsa-sha256 or hs2019)
    pub algorithm: String,
    /// Signed header names, lower-cased
    pub headers: Vec<String>,
    /// Base64-encoded signature
    pub signature: String,
}

/// Parse Signature header value
///
/// # Format
/// ```text
/// keyId="...",algorithm="...",headers="...",signature="..."
/// ```
///
/// `algorithm` defaults to `hs2019` and `headers` to `date` when absent.
pub fn parse_signature_header(header: &str) -> Result<ParsedSignature, AppError> {
    let mut key_id = None;
    let mut algorithm = None;
    let mut headers = None;
    let mut signature = None;

    for part in header.split(',') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"');

            match key {
                "keyId" => key_id = Some(value.to_string()),
                "algorithm" => algorithm = Some(value.to_string()),
                "headers" => {
                    headers = Some(
                        value
                            .split_whitespace()
                            .map(|s| s.to_ascii_lowercase())
                            .collect(),
                    )
                }
                // base64 padding contains '=', split_once keeps it in `value`
                "signature" => signature = Some(value.to_string()),
                _ => {}
            }
        }
    }

    Ok(ParsedSignature {
        key_id: key_id.ok_or_else(|| AppError::Validation("Missing keyId".to_string()))?,
        algorithm: algorithm.unwrap_or_else(|| SignatureAlgorithm::Hs2019.as_str().to_string()),
        headers: headers.unwrap_or_else(|| vec!["date".to_string()]),
        signature: signature
            .ok_or_else(|| AppError::Validation("Missing signature".to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn test_key_pair() -> KeyPair {
        generate_key_pair(1024).expect("key generation should work")
    }

    fn build_signed_header_map(url: &str, body: &[u8], private_key_pem: &str) -> (HeaderMap, String) {
        let key_id = "https://remote.example/users/alice#main-key";
        let signed = sign_request("POST", url, body, private_key_pem, key_id).expect("signed");
        let parsed_url = url::Url::parse(url).expect("valid test url");

        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_str(&signed.host).unwrap());
        headers.insert("date", HeaderValue::from_str(&signed.date).unwrap());
        headers.insert("digest", HeaderValue::from_str(&signed.digest).unwrap());
        headers.insert(
            "signature",
            HeaderValue::from_str(&signed.signature).unwrap(),
        );

        (headers, path_and_query(parsed_url.as_str()))
    }

    /// RSASSA-PKCS1-v1_5 with the DER DigestInfo header for SHA-256
    /// (RFC 8017 section 9.2), as OpenSSL-based peers produce it.
    fn pkcs1v15_sha256() -> rsa::Pkcs1v15Sign {
        const SHA256_DIGEST_INFO: [u8; 19] = [
            0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
            0x01, 0x05, 0x00, 0x04, 0x20,
        ];
        rsa::Pkcs1v15Sign {
            hash_len: Some(32),
            prefix: Box::new(SHA256_DIGEST_INFO),
        }
    }

    #[test]
    fn signature_matches_standard_pkcs1v15_encoding() {
        let keys = test_key_pair();
        let private_key = RsaPrivateKey::from_pkcs8_pem(&keys.private_key_pem).unwrap();
        let public_key = RsaPublicKey::from_public_key_pem(&keys.public_key_pem).unwrap();
        let signing_string =
            "(request-target): post /users/bob/inbox\nhost: remote.example\ndate: Tue, 07 Jun 2022 20:51:35 GMT";
        let hashed = Sha256::digest(signing_string.as_bytes());

        // PKCS#1 v1.5 is deterministic: both encoders must agree byte for byte
        let ours = BASE64
            .decode(sign(signing_string, &keys.private_key_pem, SignatureAlgorithm::RsaSha256).unwrap())
            .unwrap();
        let standard = private_key.sign(pkcs1v15_sha256(), &hashed).unwrap();
        assert_eq!(ours, standard);

        assert!(public_key.verify(pkcs1v15_sha256(), &hashed, &ours).is_ok());
        assert!(
            verify(
                signing_string,
                &BASE64.encode(&standard),
                &keys.public_key_pem,
                SignatureAlgorithm::RsaSha256
            )
            .unwrap()
        );
    }

    #[test]
    fn unprefixed_signature_is_rejected() {
        let keys = test_key_pair();
        let private_key = RsaPrivateKey::from_pkcs8_pem(&keys.private_key_pem).unwrap();
        let signing_string = "(request-target): post /inbox\nhost: remote.example";
        let hashed = Sha256::digest(signing_string.as_bytes());

        let bare = private_key
            .sign(rsa::Pkcs1v15Sign::new_unprefixed(), &hashed)
            .unwrap();
        assert!(
            !verify(
                signing_string,
                &BASE64.encode(bare),
                &keys.public_key_pem,
                SignatureAlgorithm::RsaSha256
            )
            .unwrap()
        );
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let keys = test_key_pair();
        let signing_string = "(request-target): post /inbox\nhost: remote.example";

        let signature = sign(signing_string, &keys.private_key_pem, SignatureAlgorithm::RsaSha256)
            .unwrap();
        assert!(
            verify(
                signing_string,
                &signature,
                &keys.public_key_pem,
                SignatureAlgorithm::RsaSha256
            )
            .unwrap()
        );
        assert!(
            !verify(
                "(request-target): post /other",
                &signature,
                &keys.public_key_pem,
                SignatureAlgorithm::RsaSha256
            )
            .unwrap()
        );
    }

    #[test]
    fn verify_with_other_key_is_false() {
        let signer = test_key_pair();
        let other = test_key_pair();

        let signature = sign("data", &signer.private_key_pem, SignatureAlgorithm::Hs2019).unwrap();
        let verified = verify("data", &signature, &other.public_key_pem, SignatureAlgorithm::Hs2019);
        assert!(matches!(verified, Ok(false)));
    }

    #[test]
    fn verify_rejects_malformed_key_with_crypto_error() {
        let result = verify("data", "ZmFrZQ==", "not a key", SignatureAlgorithm::RsaSha256);
        assert!(matches!(result, Err(AppError::Crypto(_))));
    }

    #[test]
    fn sign_rejects_malformed_key_with_crypto_error() {
        let result = sign("data", "not a key", SignatureAlgorithm::RsaSha256);
        assert!(matches!(result, Err(AppError::Crypto(_))));
    }

    #[test]
    fn verify_with_garbage_signature_is_false() {
        let keys = test_key_pair();
        let result = verify(
            "data",
            "!!not-base64!!",
            &keys.public_key_pem,
            SignatureAlgorithm::RsaSha256,
        );
        assert!(matches!(result, Ok(false)));
    }

    #[test]
    fn compute_digest_matches_known_value() {
        // sha256("") in base64
        assert_eq!(
            compute_digest(b""),
            "SHA-256=47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn build_signing_string_orders_and_lowercases() {
        let mut headers = HeaderMap::new();
        headers.insert("Host", HeaderValue::from_static("remote.example"));
        headers.insert("Date", HeaderValue::from_static("Tue, 07 Jun 2022 20:51:35 GMT"));

        let signing_string = build_signing_string(
            &headers,
            &["(request-target)", "Host", "date"],
            "POST",
            "https://remote.example/users/bob/inbox?page=1",
        )
        .unwrap();

        assert_eq!(
            signing_string,
            "(request-target): post /users/bob/inbox?page=1\nhost: remote.example\ndate: Tue, 07 Jun 2022 20:51:35 GMT"
        );
    }

    #[test]
    fn build_signing_string_fails_on_missing_header() {
        let headers = HeaderMap::new();
        let result = build_signing_string(&headers, &["digest"], "POST", "/inbox");
        assert!(matches!(result, Err(AppError::Validation(msg)) if msg.contains("digest")));
    }

    #[test]
    fn verify_request_accepts_valid_signed_request() {
        let keys = test_key_pair();
        let body = br#"{"type":"Follow"}"#;
        let (headers, path) = build_signed_header_map(
            "https://remote.example/inbox?foo=bar",
            body,
            &keys.private_key_pem,
        );

        let result = verify_request("POST", &path, &headers, body, &keys.public_key_pem);
        assert!(result.is_ok(), "valid signature should verify: {result:?}");
    }

    #[test]
    fn verify_request_keeps_explicit_port_in_host() {
        let keys = test_key_pair();
        let body = b"{}";
        let (headers, path) =
            build_signed_header_map("http://127.0.0.1:8123/inbox", body, &keys.private_key_pem);

        assert_eq!(headers.get("host").unwrap(), "127.0.0.1:8123");
        assert!(verify_request("POST", &path, &headers, body, &keys.public_key_pem).is_ok());
    }

    #[test]
    fn verify_request_rejects_tampered_body() {
        let keys = test_key_pair();
        let (headers, path) = build_signed_header_map(
            "https://remote.example/inbox",
            br#"{"type":"Follow"}"#,
            &keys.private_key_pem,
        );

        let result = verify_request(
            "POST",
            &path,
            &headers,
            br#"{"type":"Delete"}"#,
            &keys.public_key_pem,
        );
        assert!(matches!(result, Err(AppError::VerificationFailed)));
    }

    #[test]
    fn verify_request_rejects_wrong_key() {
        let signer = test_key_pair();
        let other = test_key_pair();
        let body = b"{}";
        let (headers, path) =
            build_signed_header_map("https://remote.example/inbox", body, &signer.private_key_pem);

        let result = verify_request("POST", &path, &headers, body, &other.public_key_pem);
        assert!(matches!(result, Err(AppError::VerificationFailed)));
    }

    #[test]
    fn verify_request_requires_signature_header() {
        let keys = test_key_pair();
        let body = b"{}";
        let (mut headers, path) =
            build_signed_header_map("https://remote.example/inbox", body, &keys.private_key_pem);
        headers.remove("signature");

        let result = verify_request("POST", &path, &headers, body, &keys.public_key_pem);
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn verify_request_rejects_when_date_not_in_signed_headers() {
        let keys = test_key_pair();
        let body = br#"{"type":"Follow"}"#;
        let (mut headers, path) =
            build_signed_header_map("https://remote.example/inbox", body, &keys.private_key_pem);

        let parsed = parse_signature_header(headers.get("signature").unwrap().to_str().unwrap())
            .expect("parsed signature");
        let tampered = format!(
            "keyId=\"{}\",algorithm=\"{}\",headers=\"(request-target) host digest\",signature=\"{}\"",
            parsed.key_id, parsed.algorithm, parsed.signature
        );
        headers.insert("signature", HeaderValue::from_str(&tampered).unwrap());

        match verify_request("POST", &path, &headers, body, &keys.public_key_pem) {
            Err(AppError::Validation(msg)) => {
                assert!(msg.contains("Signed headers must include: date"))
            }
            other => panic!("expected missing signed date error, got: {other:?}"),
        }
    }

    #[test]
    fn parse_signature_header_keeps_base64_padding() {
        let parsed = parse_signature_header(
            "keyId=\"https://remote.example/users/alice#main-key\",algorithm=\"rsa-sha256\",headers=\"(request-target) host date\",signature=\"ZmFrZQ==\"",
        )
        .unwrap();

        assert_eq!(parsed.key_id, "https://remote.example/users/alice#main-key");
        assert_eq!(parsed.signature, "ZmFrZQ==");
        assert_eq!(parsed.headers, vec!["(request-target)", "host", "date"]);
    }

    #[test]
    fn algorithm_parse_rejects_unknown() {
        assert_eq!(
            SignatureAlgorithm::parse("RSA-SHA256").unwrap(),
            SignatureAlgorithm::RsaSha256
        );
        assert!(SignatureAlgorithm::parse("ed25519").is_err());
    }

    #[test]
    fn key_id_matches_actor_accepts_same_actor() {
        assert!(key_id_matches_actor(
            "https://remote.example/users/alice#main-key",
            "https://remote.example/users/alice",
        ));
        assert!(!key_id_matches_actor(
            "https://remote.example/users/bob#main-key",
            "https://remote.example/users/alice",
        ));
    }
}
