//! Platform profiles and database
//!
//! A platform profile says, for each firmware slot, where it is stored
//! (and therefore which transfer mode writes it) and whether it is
//! encrypted. Profiles are loaded at runtime from RON files.

mod database;
mod types;

pub use database::*;
pub use types::*;
