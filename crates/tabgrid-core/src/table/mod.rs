//! Table assembly, validation and record conversion.
//!
//! Raw cell matrices come either from the [`TableAssembler`] (image path) or
//! from a PDF table source. PDF matrices go through the [`TableValidator`];
//! both end up in [`convert`].

mod assembler;
mod converter;
mod validator;

pub use assembler::TableAssembler;
pub use converter::{convert, convert_table};
pub use validator::TableValidator;
