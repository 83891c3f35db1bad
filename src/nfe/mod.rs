//! NF-e (goods invoice, model 55) XML generation.
//!
//! Implements the layout 4.00 element tree from the Manual de Orientação
//! do Contribuinte. Sibling order is a hard contract: the SEFAZ schema
//! validators reject out-of-order siblings even when each element is
//! individually well-formed.
//!
//! # Example
//!
//! ```no_run
//! use notafiscal::core::*;
//! use notafiscal::chave::{AccessKeyGenerator, OsDigitSource};
//! use notafiscal::nfe;
//!
//! let nota: Nfe = todo!(); // build via NfeBuilder
//! let chave = AccessKeyGenerator::for_nfe(&nota, &mut OsDigitSource).unwrap();
//! let xml = nfe::to_xml(&nota, &chave).unwrap();
//! ```

mod evento;
mod xml;

pub use evento::cancel_event_xml;
pub use xml::to_xml;

/// Portal Fiscal namespace shared by documents, events, and envelopes.
pub const NFE_NS: &str = "http://www.portalfiscal.inf.br/nfe";

/// Layout version emitted in `infNFe/@versao`.
pub const LAYOUT_VERSION: &str = "4.00";

/// Event layout version emitted in `evento/@versao`.
pub const EVENT_VERSION: &str = "1.00";

/// Prefix composed with the access key to form the root `Id` attribute.
pub const ID_PREFIX: &str = "NFe";

/// Cancellation event type code.
pub const CANCEL_EVENT_TYPE: &str = "110111";

/// Mandated recipient name when emitting against homologation.
pub const HOMOLOG_RECIPIENT_NAME: &str =
    "NF-E EMITIDA EM AMBIENTE DE HOMOLOGACAO - SEM VALOR FISCAL";
