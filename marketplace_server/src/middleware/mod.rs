mod stripe_signature;

pub use stripe_signature::{StripeSignatureMiddlewareFactory, StripeSignatureMiddlewareService, STRIPE_SIGNATURE_HEADER};
