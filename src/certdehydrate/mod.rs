//! Dehydrated certificates.
//!
//! A dehydrated certificate is the minimal tuple from which a full X.509
//! certificate is deterministically reconstructed:
//!
//! ```text
//! [1, pubkeyB64, notBeforeScaled, notAfterScaled, sigAlg, signatureB64]
//! ```
//!
//! Timestamps are stored in 5-minute increments. Rehydration rebuilds the
//! certificate template; the fill step stamps a host name into the subject
//! and SAN, derives the serial number, and splices the stored signature
//! into the DER encoding without re-signing. For that to verify, the
//! rebuilt `tbsCertificate` must be byte-for-byte what the original signer
//! signed, so dehydrating a filled certificate yields the original tuple.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value as Json};
use sha2::{Digest, Sha256};
use std::fmt;

mod splice;

/// Seconds per dehydrated timestamp unit.
pub const TIMESTAMP_PRECISION: i64 = 300;

/// Length of a derived serial number. 19 octets keep the value below
/// 2^159, comfortably inside the positive range of an X.509 serial field.
pub const SERIAL_LEN: usize = 19;

const DEHYDRATED_VERSION: i64 = 1;

/// Failure states of dehydrated-certificate handling.
#[derive(thiserror::Error, Debug)]
pub enum CertError {
    #[error("dehydrated certificate is not a list")]
    NotAList,
    #[error("dehydrated certificate must have a version field")]
    MissingVersion,
    #[error("dehydrated certificate has an unrecognized version")]
    UnknownVersion,
    #[error("dehydrated certificate must have 6 items")]
    WrongLength,
    #[error("dehydrated certificate {0} has the wrong type")]
    BadField(&'static str),
    #[error("invalid base64 in {0}: {1}")]
    BadBase64(&'static str, base64::DecodeError),
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(i64),
    #[error("invalid public key: {0}")]
    BadPublicKey(der::Error),
    #[error("timestamp out of range")]
    BadTimestamp,
    #[error("DER error: {0}")]
    Der(#[from] der::Error),
}

/// The six-item tuple stored in the blockchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DehydratedCertificate {
    pub pubkey_b64: String,
    pub not_before_scaled: i64,
    pub not_after_scaled: i64,
    pub signature_algorithm: i64,
    pub signature_b64: String,
}

impl DehydratedCertificate {
    /// Parses the JSON list form.
    pub fn parse(data: &Json) -> Result<Self, CertError> {
        let Json::Array(items) = data else {
            return Err(CertError::NotAList);
        };
        if items.is_empty() {
            return Err(CertError::MissingVersion);
        }
        let version = items[0]
            .as_f64()
            .ok_or(CertError::BadField("version"))? as i64;
        if version != DEHYDRATED_VERSION {
            return Err(CertError::UnknownVersion);
        }
        if items.len() < 6 {
            return Err(CertError::WrongLength);
        }
        let pubkey_b64 = items[1]
            .as_str()
            .ok_or(CertError::BadField("pubkey"))?
            .to_owned();
        let not_before_scaled = items[2]
            .as_f64()
            .ok_or(CertError::BadField("notBefore"))? as i64;
        let not_after_scaled = items[3]
            .as_f64()
            .ok_or(CertError::BadField("notAfter"))? as i64;
        let signature_algorithm = items[4]
            .as_f64()
            .ok_or(CertError::BadField("signature algorithm"))? as i64;
        let signature_b64 = items[5]
            .as_str()
            .ok_or(CertError::BadField("signature"))?
            .to_owned();
        Ok(Self {
            pubkey_b64,
            not_before_scaled,
            not_after_scaled,
            signature_algorithm,
            signature_b64,
        })
    }

    /// The JSON list form.
    pub fn to_json(&self) -> Json {
        json!([
            DEHYDRATED_VERSION,
            self.pubkey_b64,
            self.not_before_scaled,
            self.not_after_scaled,
            self.signature_algorithm,
            self.signature_b64,
        ])
    }

    /// Derives the serial number for a certificate bearing `name`:
    /// the first [`SERIAL_LEN`] octets of
    /// `SHA-256(SHA-256(name) || SHA-256(pubkey) || SHA-256(be64(notBefore))
    /// || SHA-256(be64(notAfter)))`.
    pub fn serial_number(&self, name: &str) -> Result<[u8; SERIAL_LEN], CertError> {
        let pubkey = BASE64
            .decode(&self.pubkey_b64)
            .map_err(|e| CertError::BadBase64("pubkey", e))?;
        let mut hash = Sha256::new();
        hash.update(Sha256::digest(name.as_bytes()));
        hash.update(Sha256::digest(&pubkey));
        hash.update(Sha256::digest(self.not_before_scaled.to_be_bytes()));
        hash.update(Sha256::digest(self.not_after_scaled.to_be_bytes()));
        let digest = hash.finalize();
        let mut serial = [0u8; SERIAL_LEN];
        serial.copy_from_slice(&digest[..SERIAL_LEN]);
        Ok(serial)
    }

    /// Validates the tuple and expands it into a reusable certificate
    /// template. The input is untrusted; the output is safe to fill.
    pub fn rehydrate(&self) -> Result<Rehydrated, CertError> {
        let spki_der = BASE64
            .decode(&self.pubkey_b64)
            .map_err(|e| CertError::BadBase64("pubkey", e))?;
        splice::check_public_key(&spki_der)?;
        let signature = BASE64
            .decode(&self.signature_b64)
            .map_err(|e| CertError::BadBase64("signature", e))?;
        // fails early for algorithms the splicer cannot express
        splice::signature_algorithm(self.signature_algorithm)?;
        Ok(Rehydrated {
            spki_der,
            not_before: self.not_before_scaled * TIMESTAMP_PRECISION,
            not_after: self.not_after_scaled * TIMESTAMP_PRECISION,
            signature_algorithm: self.signature_algorithm,
            signature,
        })
    }
}

impl fmt::Display for DehydratedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// A validated certificate template. Subject, SAN and serial number are
/// not fixed yet; [`Rehydrated::fill`] stamps a host name in and produces
/// the final DER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rehydrated {
    /// SubjectPublicKeyInfo, DER.
    pub spki_der: Vec<u8>,
    /// UNIX seconds, already multiplied back out of the 5-minute scale.
    pub not_before: i64,
    pub not_after: i64,
    pub signature_algorithm: i64,
    pub signature: Vec<u8>,
}

impl Rehydrated {
    /// The inverse of [`DehydratedCertificate::rehydrate`].
    pub fn dehydrate(&self) -> DehydratedCertificate {
        DehydratedCertificate {
            pubkey_b64: BASE64.encode(&self.spki_der),
            not_before_scaled: self.not_before.div_euclid(TIMESTAMP_PRECISION),
            not_after_scaled: self.not_after.div_euclid(TIMESTAMP_PRECISION),
            signature_algorithm: self.signature_algorithm,
            signature_b64: BASE64.encode(&self.signature),
        }
    }

    /// Produces the DER certificate for `host`: subject CN and SAN carry
    /// the host, the serial number is derived from the tuple and the host,
    /// and the stored signature is attached verbatim.
    pub fn fill(&self, host: &str) -> Result<Vec<u8>, CertError> {
        let serial = self.dehydrate().serial_number(host)?;
        splice::build_certificate(self, host, &serial)
    }
}

/// Reduces a DER certificate to its dehydrated tuple.
pub fn dehydrate_cert(der: &[u8]) -> Result<DehydratedCertificate, CertError> {
    Ok(splice::rehydrated_from_cert(der)?.dehydrate())
}
