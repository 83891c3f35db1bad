//! Enveloped XML digital signatures for fiscal documents.
//!
//! The signing pipeline is `Unsigned -> Canonicalized -> Digested ->
//! Signed`; any step can fail into a [`crate::core::NotaError::Signature`]
//! that carries the unsigned XML for inspection. Certificate
//! preconditions (validity window, private key presence, passphrase) are
//! checked before any cryptographic work begins.

mod certificado;
mod signer;

pub use certificado::Certificado;
pub use signer::{SignaturePolicy, Signer};

/// XML-DSig namespace.
pub const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Exclusive C14N (no comments) algorithm identifier.
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Enveloped-signature transform identifier.
pub const ENVELOPED: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
