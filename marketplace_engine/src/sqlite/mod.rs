//! SQLite backend for the marketplace engine.
//!
//! [`SqliteDatabase`] implements every repository trait, plus [`crate::traits::MarketplaceDatabase`]. The low-level
//! queries live in [`db`].
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
