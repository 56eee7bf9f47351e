//! Value types shared by the marketplace engine and server.
mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Money, MoneyParseError, DEFAULT_CURRENCY_CODE};
pub use secret::Secret;
