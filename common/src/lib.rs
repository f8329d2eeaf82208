//! StoreFX Common Types
//!
//! This crate contains the data model shared by the StoreFX crates:
//! identifiers, currency codes and money, currencies, exchange tables and
//! exchange rates, and the clock used to decide which table is operative.

pub mod identifiers;
pub mod monetary;
pub mod exchange;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use exchange::*;
pub use error::*;
pub use time::*;
