pub mod geo;
pub mod notifications;
pub mod stripe;
