//! # notafiscal
//!
//! Brazilian e-invoicing library covering the document-to-wire lifecycle:
//! NF-e (goods invoice, layout 4.00), NFS-e/DPS (national service invoice),
//! access keys, XML digital signatures, and transmission to the tax
//! authority webservices.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating point.
//! The core types follow the NF-e semantic model from the Manual de
//! Orientação do Contribuinte (MOC).
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{FixedOffset, TimeZone};
//! use notafiscal::core::*;
//! use rust_decimal_macros::dec;
//!
//! let brt = FixedOffset::west_opt(3 * 3600).unwrap();
//! let nota = NfeBuilder::new(1, 1, brt.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap())
//!     .environment(Environment::Homologacao)
//!     .issuer(IssuerBuilder::new("12345678000195", "Acme Comercio Ltda",
//!         AddressBuilder::new("Sao Paulo", "3550308", Uf::Sp).build())
//!         .state_registration("123456789012")
//!         .tax_regime(TaxRegime::SimplesNacional)
//!         .build())
//!     .recipient(RecipientBuilder::new(PartyId::Cnpj("98765432000192".into()), "Cliente SA",
//!         AddressBuilder::new("Campinas", "3509502", Uf::Sp).build())
//!         .build())
//!     .add_item(LineItemBuilder::new("001", "Parafuso sextavado", dec!(10), "UN", dec!(2.50))
//!         .ncm("73181500")
//!         .cfop("5102")
//!         .build())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(nota.totals.as_ref().unwrap().products_total, dec!(25.00));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Document model, access keys, pre-flight validation, numbering |
//! | `xml` | NF-e / DPS / cancellation event XML generation |
//! | `dsig` | PKCS#12 certificates and enveloped XML-DSig signing |
//! | `schema` | XSD validation against the published schema sets |
//! | `transmissao` | SOAP/REST envelopes, endpoint resolution, submission |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod chave;

#[cfg(feature = "xml")]
pub mod nfe;

#[cfg(feature = "xml")]
pub mod nfse;

#[cfg(feature = "dsig")]
pub mod dsig;

#[cfg(feature = "schema")]
pub mod schema;

#[cfg(feature = "transmissao")]
pub mod transmissao;

#[cfg(feature = "xml")]
pub(crate) mod xml_utils;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
