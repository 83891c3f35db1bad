//! Core fiscal document types, validation, and numbering.
//!
//! This module provides the foundational types for Brazilian electronic
//! invoicing based on the NF-e layout 4.00 and the national NFS-e (DPS)
//! semantic models, with pre-flight validation.

mod builder;
mod error;
mod format;
mod numbering;
mod types;
pub mod uf;
mod validation;

pub use builder::*;
pub use error::*;
pub use format::*;
pub use numbering::*;
pub use types::*;
pub use uf::Uf;
pub use validation::*;
