mod helpers;
mod mocks;
mod orders;
mod refunds;
mod webhooks;
mod withdrawals;
