use thiserror::Error;

/// Errors that can occur during document construction or processing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotaError {
    /// One or more validation rules failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Builder encountered invalid or missing configuration.
    #[error("builder error: {0}")]
    Builder(String),

    /// Document number sequencing error.
    #[error("numbering error: {0}")]
    Numbering(String),

    /// A required model field was missing or malformed when the XML
    /// generator needed it. The upstream validation should have caught
    /// this; the generator never substitutes defaults for required fields.
    #[error("document assembly error: {field}: {reason}")]
    DocumentAssembly { field: String, reason: String },

    /// An access-key sub-field did not have its mandated width. Always
    /// fatal: it indicates a defect in whoever assembled the sub-fields.
    #[error("access key assembly error: {field} is {actual} digit(s), expected {expected}")]
    KeyAssembly {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The signing certificate was unusable. Carries the specific
    /// sub-reason; never retried.
    #[error("certificate error: {0}")]
    Certificate(CertificateErrorKind),

    /// Reference lookup, canonicalization, or signing failed. The
    /// unsigned XML is carried so the caller can inspect what was about
    /// to be signed.
    #[error("signature error: {reason}")]
    Signature {
        reason: String,
        unsigned_xml: Option<String>,
    },

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Genuine connectivity, timeout, or TLS failure while talking to the
    /// authority. Never produced for an unresolvable host — that case
    /// yields a simulated reply instead.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Why a signing certificate was rejected before any cryptographic work.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CertificateErrorKind {
    /// PKCS#12 MAC verification failed for the supplied passphrase.
    BadPassphrase,
    /// The container held no private key bag.
    MissingPrivateKey,
    /// The container held no certificate bag.
    MissingCertificate,
    /// The certificate validity window has not started yet.
    NotYetValid,
    /// The certificate validity window has ended.
    Expired,
    /// The container or certificate could not be decoded.
    Corrupt(String),
}

impl std::fmt::Display for CertificateErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadPassphrase => write!(f, "PKCS#12 passphrase is incorrect"),
            Self::MissingPrivateKey => write!(f, "no private key in PKCS#12 container"),
            Self::MissingCertificate => write!(f, "no certificate in PKCS#12 container"),
            Self::NotYetValid => write!(f, "certificate is not yet valid"),
            Self::Expired => write!(f, "certificate has expired"),
            Self::Corrupt(detail) => write!(f, "certificate data is corrupt: {detail}"),
        }
    }
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "issuer.address.municipality_code").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// NF-e layout field ID if applicable (e.g. "B02" for cUF).
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    /// Create a validation error without a layout field ID.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    /// Create a validation error with an NF-e layout field ID.
    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }
}

impl NotaError {
    /// Shorthand for a [`NotaError::DocumentAssembly`] naming the field.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::DocumentAssembly {
            field: field.into(),
            reason: "required field is missing or empty".into(),
        }
    }
}
