//! The signer capability and the built-in signature backends.
//!
//! Packet encoders take a signer as an opaque capability: an algorithm
//! identifier, a key locator, a size estimate and a sign operation over
//! the covered byte ranges. Nothing else about the crypto backend leaks
//! into the codec or the engine.

use crate::error::Error;
use crate::name::Name;
use crate::packet::{KeyLocator, SigType, SignatureInfo};
use crate::wire::Wire;
use crate::Result;
use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Signs packets. `covered` is the exact signed-byte range as a list of
/// slices; implementations must treat it as one logical buffer.
pub trait Signer: Send + Sync {
    fn sig_type(&self) -> SigType;
    fn key_locator(&self) -> Option<Name>;
    /// Exact size of the signatures this signer produces.
    fn estimate_size(&self) -> usize;
    fn sign(&self, covered: &[&[u8]]) -> Result<Vec<u8>>;
}

/// Validates a signature over the covered range.
pub trait SigChecker: Send + Sync {
    fn check(
        &self,
        sig_info: Option<&SignatureInfo>,
        covered: &[&[u8]],
        sig_value: Option<&[u8]>,
    ) -> Result<()>;
}

/// Borrows a wire's segments as signing input.
pub fn covered_slices(wire: &Wire) -> Vec<&[u8]> {
    wire.iter().map(|seg| seg.as_ref()).collect()
}

fn sha256_all(covered: &[&[u8]]) -> [u8; 32] {
    let mut h = Sha256::new();
    for part in covered {
        h.update(part);
    }
    h.finalize().into()
}

/* ---------------------------------------------------------------- *
 * DigestSha256
 * ---------------------------------------------------------------- */

/// The integrity-only signature: SHA-256 of the covered range.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Signer;

impl Signer for Sha256Signer {
    fn sig_type(&self) -> SigType {
        SigType::DigestSha256
    }

    fn key_locator(&self) -> Option<Name> {
        None
    }

    fn estimate_size(&self) -> usize {
        32
    }

    fn sign(&self, covered: &[&[u8]]) -> Result<Vec<u8>> {
        Ok(sha256_all(covered).to_vec())
    }
}

/* ---------------------------------------------------------------- *
 * HmacWithSha256
 * ---------------------------------------------------------------- */

pub struct HmacSigner {
    key: Vec<u8>,
    key_name: Name,
}

impl HmacSigner {
    pub fn new(key_name: Name, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            key_name,
        }
    }
}

impl Signer for HmacSigner {
    fn sig_type(&self) -> SigType {
        SigType::HmacWithSha256
    }

    fn key_locator(&self) -> Option<Name> {
        Some(self.key_name.clone())
    }

    fn estimate_size(&self) -> usize {
        32
    }

    fn sign(&self, covered: &[&[u8]]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| Error::Security(format!("bad HMAC key: {e}")))?;
        for part in covered {
            mac.update(part);
        }
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/* ---------------------------------------------------------------- *
 * Ed25519
 * ---------------------------------------------------------------- */

pub struct Ed25519Signer {
    key: SigningKey,
    key_name: Name,
}

impl Ed25519Signer {
    pub fn new(key_name: Name, seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
            key_name,
        }
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl Signer for Ed25519Signer {
    fn sig_type(&self) -> SigType {
        SigType::Ed25519
    }

    fn key_locator(&self) -> Option<Name> {
        Some(self.key_name.clone())
    }

    fn estimate_size(&self) -> usize {
        64
    }

    fn sign(&self, covered: &[&[u8]]) -> Result<Vec<u8>> {
        let joined: Vec<u8> = covered.concat();
        Ok(self.key.sign(&joined).to_bytes().to_vec())
    }
}

/* ---------------------------------------------------------------- *
 * Test signer
 * ---------------------------------------------------------------- */

/// Produces an empty signature of the test-only type.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySigner;

impl Signer for EmptySigner {
    fn sig_type(&self) -> SigType {
        SigType::EmptyTest
    }

    fn key_locator(&self) -> Option<Name> {
        None
    }

    fn estimate_size(&self) -> usize {
        0
    }

    fn sign(&self, _covered: &[&[u8]]) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/* ---------------------------------------------------------------- *
 * Checkers
 * ---------------------------------------------------------------- */

/// Accepts everything. The default for loopback management traffic.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllChecker;

impl SigChecker for AcceptAllChecker {
    fn check(
        &self,
        _sig_info: Option<&SignatureInfo>,
        _covered: &[&[u8]],
        _sig_value: Option<&[u8]>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Verifies DigestSha256 signatures.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Checker;

impl SigChecker for Sha256Checker {
    fn check(
        &self,
        sig_info: Option<&SignatureInfo>,
        covered: &[&[u8]],
        sig_value: Option<&[u8]>,
    ) -> Result<()> {
        match sig_info.map(|i| i.sig_type) {
            Some(SigType::DigestSha256) => {}
            other => {
                return Err(Error::Security(format!(
                    "expected DigestSha256, got {other:?}"
                )))
            }
        }
        let sig = sig_value.ok_or(Error::SkipRequired("SignatureValue"))?;
        if sig == sha256_all(covered) {
            Ok(())
        } else {
            Err(Error::Security("digest mismatch".into()))
        }
    }
}

pub struct HmacChecker {
    key: Vec<u8>,
}

impl HmacChecker {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }
}

impl SigChecker for HmacChecker {
    fn check(
        &self,
        sig_info: Option<&SignatureInfo>,
        covered: &[&[u8]],
        sig_value: Option<&[u8]>,
    ) -> Result<()> {
        match sig_info.map(|i| i.sig_type) {
            Some(SigType::HmacWithSha256) => {}
            other => {
                return Err(Error::Security(format!(
                    "expected HmacWithSha256, got {other:?}"
                )))
            }
        }
        let sig = sig_value.ok_or(Error::SkipRequired("SignatureValue"))?;
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| Error::Security(format!("bad HMAC key: {e}")))?;
        for part in covered {
            mac.update(part);
        }
        mac.verify_slice(sig)
            .map_err(|_| Error::Security("HMAC verification failed".into()))
    }
}

pub struct Ed25519Checker {
    key: VerifyingKey,
}

impl Ed25519Checker {
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }
}

impl SigChecker for Ed25519Checker {
    fn check(
        &self,
        sig_info: Option<&SignatureInfo>,
        covered: &[&[u8]],
        sig_value: Option<&[u8]>,
    ) -> Result<()> {
        match sig_info.map(|i| i.sig_type) {
            Some(SigType::Ed25519) => {}
            other => {
                return Err(Error::Security(format!("expected Ed25519, got {other:?}")))
            }
        }
        let sig = sig_value.ok_or(Error::SkipRequired("SignatureValue"))?;
        let sig = ed25519_dalek::Signature::from_slice(sig)
            .map_err(|e| Error::Security(format!("bad signature: {e}")))?;
        let joined: Vec<u8> = covered.concat();
        self.key
            .verify(&joined, &sig)
            .map_err(|_| Error::Security("Ed25519 verification failed".into()))
    }
}

/// Builds the signature metadata a signer stamps onto a packet.
pub fn sig_info_for(signer: &dyn Signer) -> SignatureInfo {
    let mut info = SignatureInfo::new(signer.sig_type());
    if let Some(name) = signer.key_locator() {
        info.key_locator = Some(KeyLocator::Name(name));
    }
    info
}
