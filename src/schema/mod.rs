//! XSD validation against the published schema sets.
//!
//! Each document kind validates against an ordered set of dependent
//! schema files (base datatypes first, the entry schema last — later
//! files reference types defined earlier). Validation collects every
//! violation in one pass so a document can be fixed in one round-trip.
//!
//! Missing schema files are not a hard failure: the authority publishes
//! schema packs on their own calendar, and the pipeline must stay usable
//! before they land. That degraded outcome is flagged on the result and
//! logged at `warn` so it is never mistaken for a genuine pass.

use std::path::{Path, PathBuf};

use libxml::parser::Parser;
use libxml::schemas::{SchemaParserContext, SchemaValidationContext};

use crate::core::NotaError;

/// Which schema set a document validates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// NF-e layout 4.00.
    Nfe,
    /// Cancellation event 1.00.
    CancelEvent,
    /// National DPS 1.00.
    Dps,
}

impl SchemaKind {
    /// Schema files in dependency order; the last entry is the
    /// validation entry point and pulls the others in via include.
    pub fn ordered_files(&self) -> &'static [&'static str] {
        match self {
            Self::Nfe => &[
                "xmldsig-core-schema_v1.01.xsd",
                "tiposBasico_v4.00.xsd",
                "leiauteNFe_v4.00.xsd",
                "nfe_v4.00.xsd",
            ],
            Self::CancelEvent => &[
                "xmldsig-core-schema_v1.01.xsd",
                "tiposBasico_v4.00.xsd",
                "eventoCancNFe_v1.00.xsd",
            ],
            Self::Dps => &[
                "xmldsig-core-schema_v1.01.xsd",
                "tiposComplexos_v1.00.xsd",
                "DPS_v1.00.xsd",
            ],
        }
    }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Validator message, as produced by libxml2.
    pub message: String,
    /// 1-based line in the validated document, when known.
    pub line: Option<i32>,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Outcome of a schema validation pass.
#[derive(Debug, Clone)]
pub struct SchemaValidation {
    /// True when no violations were found (including the degraded case).
    pub valid: bool,
    /// True when schema files were missing and validation was skipped.
    /// A skipped pass is NOT evidence of schema conformance.
    pub skipped_missing_schemas: bool,
    /// Every violation found, in document order.
    pub errors: Vec<SchemaViolation>,
}

/// Validates documents against schema files under a configured directory.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    dir: PathBuf,
}

impl SchemaValidator {
    /// Validator rooted at the directory holding the schema pack.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Validate a document (signed or unsigned) against its kind's set.
    ///
    /// # Errors
    /// [`NotaError::Xml`] when the document itself cannot be parsed or
    /// the schema files exist but are themselves invalid. Missing schema
    /// files are the degraded outcome, never an error.
    pub fn validate(&self, xml: &str, kind: SchemaKind) -> Result<SchemaValidation, NotaError> {
        self.validate_with_files(xml, kind.ordered_files())
    }

    /// Validate against an explicit ordered file list (the last entry is
    /// the entry schema).
    pub fn validate_with_files(
        &self,
        xml: &str,
        ordered_files: &[&str],
    ) -> Result<SchemaValidation, NotaError> {
        let missing: Vec<&str> = ordered_files
            .iter()
            .copied()
            .filter(|f| !self.dir.join(f).is_file())
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                target: "notafiscal::schema",
                missing = ?missing,
                dir = %self.dir.display(),
                "schema files missing, validation skipped"
            );
            return Ok(SchemaValidation {
                valid: true,
                skipped_missing_schemas: true,
                errors: Vec::new(),
            });
        }

        let entry = self
            .dir
            .join(ordered_files.last().ok_or_else(|| {
                NotaError::Xml("schema set must name at least one file".into())
            })?);

        let doc = Parser::default()
            .parse_string(xml)
            .map_err(|e| NotaError::Xml(format!("document parse error: {e:?}")))?;

        let mut schema_parser = SchemaParserContext::from_file(&path_str(&entry));
        let mut context = SchemaValidationContext::from_parser(&mut schema_parser)
            .map_err(|errors| {
                NotaError::Xml(format!(
                    "schema {} failed to parse: {}",
                    entry.display(),
                    first_message(&errors)
                ))
            })?;

        match context.validate_document(&doc) {
            Ok(()) => Ok(SchemaValidation {
                valid: true,
                skipped_missing_schemas: false,
                errors: Vec::new(),
            }),
            Err(errors) => Ok(SchemaValidation {
                valid: false,
                skipped_missing_schemas: false,
                errors: errors
                    .iter()
                    .map(|e| SchemaViolation {
                        message: e.message.clone().unwrap_or_default(),
                        line: e.line,
                    })
                    .collect(),
            }),
        }
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn first_message(errors: &[libxml::error::StructuredError]) -> String {
    errors
        .first()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| "unknown schema error".into())
}
