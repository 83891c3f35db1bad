//! NFS-e service invoice declaration (DPS) XML generation.
//!
//! Implements the national NFS-e DPS layout 1.00. Unlike the NF-e, the
//! DPS is submitted to a single national gateway rather than a state
//! SEFAZ, and its identifier has no random component — it is derived
//! entirely from the provider's registration and the document sequence.

mod xml;

pub use xml::to_xml;

/// National NFS-e namespace.
pub const NFSE_NS: &str = "http://www.sped.fazenda.gov.br/nfse";

/// Layout version emitted in `infDPS/@versao`.
pub const LAYOUT_VERSION: &str = "1.00";

/// Prefix composed with the DPS digits to form the root `Id` attribute.
pub const ID_PREFIX: &str = "DPS";
