//! Policy module
//!
//! Insured perils and the immutable parameters a quote is computed from

mod peril;
mod types;

pub use peril::{Direction, PayoutStyle, Peril};
pub use types::{PolicyError, PolicyParameters, MAX_COVERAGE, MAX_TERM_MONTHS};

pub(crate) use types::is_valid_location;
