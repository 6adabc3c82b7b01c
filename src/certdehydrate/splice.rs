//! X.509 assembly around a pre-existing signature.
//!
//! Ordinary certificate builders insist on signing the encoding they
//! produce. Here the signature already exists (it lives in the blockchain),
//! so the `tbsCertificate` has to be reconstructed byte-for-byte the way
//! the original signer encoded it and the signature bit string attached
//! verbatim. Field order, string types and extension order therefore all
//! matter; they follow the encoding conventions of the certificates this
//! scheme was defined for: subject and issuer are `CN`, then
//! `serialNumber`, each as a single-attribute RDN with PrintableString
//! values where possible, and the extension list is key usage (critical),
//! extended key usage, basic constraints (critical), subject alternative
//! name.

use const_oid::db::{rfc4519, rfc5280, rfc5912, rfc8410};
use const_oid::AssociatedOid;
use der::asn1::{
    BitString, GeneralizedTime, Ia5String, Null, OctetString, PrintableStringRef, SetOfVec,
    UtcTime, Utf8StringRef,
};
use der::{Any, Decode, Encode};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectAltName,
};
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};

use super::{CertError, Rehydrated};

/// Subject serialNumber attribute of every rehydrated certificate.
const SUBJECT_SERIAL_NUMBER: &str = "Namecoin TLS Certificate";

/// Maps a dehydrated signature-algorithm code to its DER identifier.
/// The code numbering is fixed by the on-chain format and cannot change.
pub(super) fn signature_algorithm(code: i64) -> Result<AlgorithmIdentifierOwned, CertError> {
    let (oid, null_params) = match code {
        3 => (rfc5912::SHA_1_WITH_RSA_ENCRYPTION, true),
        4 => (rfc5912::SHA_256_WITH_RSA_ENCRYPTION, true),
        5 => (rfc5912::SHA_384_WITH_RSA_ENCRYPTION, true),
        6 => (rfc5912::SHA_512_WITH_RSA_ENCRYPTION, true),
        10 => (rfc5912::ECDSA_WITH_SHA_256, false),
        11 => (rfc5912::ECDSA_WITH_SHA_384, false),
        12 => (rfc5912::ECDSA_WITH_SHA_512, false),
        16 => (rfc8410::ID_ED_25519, false),
        other => return Err(CertError::UnsupportedAlgorithm(other)),
    };
    let parameters = if null_params {
        Some(Any::encode_from(&Null)?)
    } else {
        None
    };
    Ok(AlgorithmIdentifierOwned { oid, parameters })
}

fn algorithm_code(alg: &AlgorithmIdentifierOwned) -> Result<i64, CertError> {
    let code = if alg.oid == rfc5912::SHA_1_WITH_RSA_ENCRYPTION {
        3
    } else if alg.oid == rfc5912::SHA_256_WITH_RSA_ENCRYPTION {
        4
    } else if alg.oid == rfc5912::SHA_384_WITH_RSA_ENCRYPTION {
        5
    } else if alg.oid == rfc5912::SHA_512_WITH_RSA_ENCRYPTION {
        6
    } else if alg.oid == rfc5912::ECDSA_WITH_SHA_256 {
        10
    } else if alg.oid == rfc5912::ECDSA_WITH_SHA_384 {
        11
    } else if alg.oid == rfc5912::ECDSA_WITH_SHA_512 {
        12
    } else if alg.oid == rfc8410::ID_ED_25519 {
        16
    } else {
        return Err(CertError::UnsupportedAlgorithm(-1));
    };
    Ok(code)
}

/// Validates that the bytes are a parseable SubjectPublicKeyInfo.
pub(super) fn check_public_key(spki_der: &[u8]) -> Result<(), CertError> {
    SubjectPublicKeyInfoOwned::from_der(spki_der)
        .map(|_| ())
        .map_err(CertError::BadPublicKey)
}

fn asn1_time(secs: i64) -> Result<Time, CertError> {
    if secs < 0 {
        return Err(CertError::BadTimestamp);
    }
    let duration = core::time::Duration::from_secs(secs as u64);
    // UTCTime covers dates before 2050; later dates use GeneralizedTime
    match UtcTime::from_unix_duration(duration) {
        Ok(t) => Ok(Time::UtcTime(t)),
        Err(_) => Ok(Time::GeneralTime(GeneralizedTime::from_unix_duration(
            duration,
        )?)),
    }
}

fn time_secs(t: &Time) -> i64 {
    match t {
        Time::UtcTime(t) => t.to_unix_duration().as_secs() as i64,
        Time::GeneralTime(t) => t.to_unix_duration().as_secs() as i64,
    }
}

fn is_printable(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || " '()+,-./:=?".contains(c))
}

fn string_value(s: &str) -> Result<Any, CertError> {
    if is_printable(s) {
        Ok(Any::encode_from(&PrintableStringRef::new(s)?)?)
    } else {
        Ok(Any::encode_from(&Utf8StringRef::new(s)?)?)
    }
}

fn single_attr_rdn(
    oid: const_oid::ObjectIdentifier,
    value: &str,
) -> Result<RelativeDistinguishedName, CertError> {
    let attr = AttributeTypeAndValue {
        oid,
        value: string_value(value)?,
    };
    Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![attr])?))
}

fn distinguished_name(host: &str) -> Result<Name, CertError> {
    Ok(RdnSequence(vec![
        single_attr_rdn(rfc4519::CN, host)?,
        single_attr_rdn(rfc4519::SERIAL_NUMBER, SUBJECT_SERIAL_NUMBER)?,
    ]))
}

fn extensions(host: &str) -> Result<Vec<Extension>, CertError> {
    let key_usage = KeyUsage(KeyUsages::DigitalSignature.into());
    let ext_key_usage = ExtendedKeyUsage(vec![rfc5280::ID_KP_SERVER_AUTH]);
    let basic_constraints = BasicConstraints {
        ca: false,
        path_len_constraint: None,
    };
    let san = SubjectAltName(vec![GeneralName::DnsName(Ia5String::new(host)?)]);
    Ok(vec![
        extension(KeyUsage::OID, true, key_usage.to_der()?)?,
        extension(ExtendedKeyUsage::OID, false, ext_key_usage.to_der()?)?,
        extension(BasicConstraints::OID, true, basic_constraints.to_der()?)?,
        extension(SubjectAltName::OID, false, san.to_der()?)?,
    ])
}

fn extension(
    extn_id: const_oid::ObjectIdentifier,
    critical: bool,
    value: Vec<u8>,
) -> Result<Extension, CertError> {
    Ok(Extension {
        extn_id,
        critical,
        extn_value: OctetString::new(value)?,
    })
}

/// Encodes the certificate for `host` and attaches the template's
/// signature verbatim. The template is self-issued: issuer equals subject.
pub(super) fn build_certificate(
    template: &Rehydrated,
    host: &str,
    serial: &[u8],
) -> Result<Vec<u8>, CertError> {
    let algorithm = signature_algorithm(template.signature_algorithm)?;
    let spki =
        SubjectPublicKeyInfoOwned::from_der(&template.spki_der).map_err(CertError::BadPublicKey)?;
    let subject = distinguished_name(host)?;

    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(serial)?,
        signature: algorithm.clone(),
        issuer: subject.clone(),
        validity: Validity {
            not_before: asn1_time(template.not_before)?,
            not_after: asn1_time(template.not_after)?,
        },
        subject,
        subject_public_key_info: spki,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions(host)?),
    };

    let certificate = Certificate {
        tbs_certificate,
        signature_algorithm: algorithm,
        signature: BitString::from_bytes(&template.signature)?,
    };
    Ok(certificate.to_der()?)
}

/// Recovers the template fields from an encoded certificate.
pub(super) fn rehydrated_from_cert(der_bytes: &[u8]) -> Result<Rehydrated, CertError> {
    let certificate = Certificate::from_der(der_bytes)?;
    let tbs = &certificate.tbs_certificate;
    Ok(Rehydrated {
        spki_der: tbs.subject_public_key_info.to_der()?,
        not_before: time_secs(&tbs.validity.not_before),
        not_after: time_secs(&tbs.validity.not_after),
        signature_algorithm: algorithm_code(&certificate.signature_algorithm)?,
        signature: certificate.signature.raw_bytes().to_vec(),
    })
}
