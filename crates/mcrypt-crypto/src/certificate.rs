//! Self-signed certificate records
//!
//! A certificate here is a structured record (serial, issuer, subject,
//! validity window, public key, usages) signed over its canonical JSON
//! serialization, not an X.509 document. Verification checks the validity
//! window against the current time, then the signature against either the
//! embedded public key (self-signed) or a supplied issuer key.

use chrono::{DateTime, Duration, Utc};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use mcrypt_core::{CryptoError, CryptoResult};

use crate::asymmetric::{self, RsaKeyPair};
use crate::symmetric::b64;

/// Certificate record format version.
pub const CERTIFICATE_VERSION: u32 = 1;

/// Subject details supplied at issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub common_name: String,
    pub organization: String,
    pub validity_days: i64,
    pub key_usages: Vec<String>,
}

impl Default for CertificateInfo {
    fn default() -> Self {
        Self {
            common_name: "multicrypt".into(),
            organization: "Multicrypt".into(),
            validity_days: 365,
            key_usages: vec!["digitalSignature".into(), "keyEncipherment".into()],
        }
    }
}

/// The to-be-signed portion. Serialized canonically (fixed field order,
/// compact JSON) for signing and verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TbsCertificate {
    version: u32,
    serial: String,
    issuer: String,
    subject: String,
    organization: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    #[serde(with = "b64")]
    public_key_der: Vec<u8>,
    key_usages: Vec<String>,
}

/// A signed certificate record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    #[serde(flatten)]
    tbs: TbsCertificate,
    #[serde(with = "b64")]
    signature: Vec<u8>,
}

impl Certificate {
    pub fn serial(&self) -> &str {
        &self.tbs.serial
    }

    pub fn subject(&self) -> &str {
        &self.tbs.subject
    }

    pub fn issuer(&self) -> &str {
        &self.tbs.issuer
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.tbs.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.tbs.not_after
    }

    pub fn key_usages(&self) -> &[String] {
        &self.tbs.key_usages
    }

    /// The embedded subject public key.
    pub fn public_key(&self) -> CryptoResult<RsaPublicKey> {
        RsaPublicKey::from_public_key_der(&self.tbs.public_key_der)
            .map_err(|e| CryptoError::Certificate(format!("embedded public key: {e}")))
    }

    /// SHA-256 fingerprint of the canonical TBS bytes, hex-encoded.
    pub fn fingerprint(&self) -> CryptoResult<String> {
        let tbs = canonical_tbs(&self.tbs)?;
        Ok(hex::encode(Sha256::digest(&tbs)))
    }
}

fn canonical_tbs(tbs: &TbsCertificate) -> CryptoResult<Vec<u8>> {
    serde_json::to_vec(tbs).map_err(CryptoError::from)
}

/// Issue a self-signed certificate for `keypair`.
pub fn issue_self_signed(info: &CertificateInfo, keypair: &RsaKeyPair) -> CryptoResult<Certificate> {
    if info.validity_days <= 0 {
        return Err(CryptoError::Certificate(format!(
            "non-positive validity: {} days",
            info.validity_days
        )));
    }

    let public_key_der = keypair
        .public()
        .to_public_key_der()
        .map_err(|e| CryptoError::Certificate(format!("encoding public key: {e}")))?
        .into_vec();

    let now = Utc::now();
    let tbs = TbsCertificate {
        version: CERTIFICATE_VERSION,
        serial: Uuid::new_v4().to_string(),
        issuer: info.common_name.clone(),
        subject: info.common_name.clone(),
        organization: info.organization.clone(),
        not_before: now,
        not_after: now + Duration::days(info.validity_days),
        public_key_der,
        key_usages: info.key_usages.clone(),
    };

    let signature = asymmetric::sign(&canonical_tbs(&tbs)?, keypair.private());
    Ok(Certificate { tbs, signature })
}

/// Verify a certificate's validity window and signature.
///
/// With `issuer_key = None` the certificate is treated as self-signed and
/// checked against its own embedded key.
pub fn verify_certificate(
    cert: &Certificate,
    issuer_key: Option<&RsaPublicKey>,
) -> CryptoResult<()> {
    let now = Utc::now();
    if now < cert.tbs.not_before {
        return Err(CryptoError::Certificate(format!(
            "not yet valid (notBefore {})",
            cert.tbs.not_before
        )));
    }
    if now > cert.tbs.not_after {
        return Err(CryptoError::Certificate(format!(
            "expired (notAfter {})",
            cert.tbs.not_after
        )));
    }

    let embedded;
    let key = match issuer_key {
        Some(key) => key,
        None => {
            embedded = cert.public_key()?;
            &embedded
        }
    };

    let tbs = canonical_tbs(&cert.tbs)?;
    if asymmetric::verify(&tbs, &cert.signature, key) {
        Ok(())
    } else {
        Err(CryptoError::SignatureVerification)
    }
}
