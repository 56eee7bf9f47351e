//! # Marketplace server
//! This crate hosts the HTTP server for the marketplace. It is responsible for:
//! * Exposing the engine's order, checkout, refund, store, wallet and messaging APIs as JSON endpoints.
//! * Receiving Stripe webhooks and recording the payments they confirm.
//! * Providing the Stripe payment processor and the IP geolocation lookup that the engine calls out to.
//! * Optionally posting order, refund and withdrawal updates to a notification webhook.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: The marketplace API. See [routes](routes/index.html).
//! * `/webhooks/stripe`: Stripe webhook deliveries. Requests must carry a valid `Stripe-Signature` header.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
