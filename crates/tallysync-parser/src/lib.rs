//! Tally XML normalization pipeline
//!
//! The extraction core: parses free-text currency amounts, repairs and walks
//! loosely structured ledger XML, and produces canonical account records.
//! Everything here is synchronous and total; upstream weirdness degrades to
//! logged defaults instead of errors.

pub mod currency;
pub mod error;
pub mod normalize;
pub mod types;
pub mod xml;

pub use currency::parse_currency;
pub use error::ParseError;
pub use normalize::{normalize, BALANCE_EPSILON};
pub use types::{AccountRecord, AccountType};
pub use xml::{parse_document, Element};
