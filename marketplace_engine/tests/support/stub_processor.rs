use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use marketplace_engine::traits::{
    PaymentIntent,
    PaymentIntentRequest,
    PaymentProcessor,
    Payout,
    PayoutRequest,
    ProcessorBalance,
    ProcessorError,
    ProcessorRefund,
    ProcessorRefundRequest,
};
use mkt_common::Money;

/// An in-memory payment processor that records every request it receives.
#[derive(Clone, Default)]
pub struct StubProcessor {
    failing: Arc<AtomicBool>,
    delay_ms: Arc<AtomicU64>,
    pub refunds: Arc<Mutex<Vec<ProcessorRefundRequest>>>,
    pub payouts: Arc<Mutex<Vec<PayoutRequest>>>,
    pub intents: Arc<Mutex<Vec<PaymentIntentRequest>>>,
}

impl StubProcessor {
    /// Every following call fails with [`ProcessorError::Unavailable`] while `failing` is true.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes every call take `ms` milliseconds, to widen race windows.
    pub fn set_delay(&self, ms: u64) {
        self.delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn refund_count(&self) -> usize {
        self.refunds.lock().unwrap().len()
    }

    pub fn payout_count(&self) -> usize {
        self.payouts.lock().unwrap().len()
    }

    async fn call(&self) -> Result<(), ProcessorError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProcessorError::Unavailable("stub processor is down".into()));
        }
        Ok(())
    }
}

impl PaymentProcessor for StubProcessor {
    async fn create_payment_intent(&self, request: PaymentIntentRequest) -> Result<PaymentIntent, ProcessorError> {
        self.call().await?;
        let mut intents = self.intents.lock().unwrap();
        let intent = PaymentIntent {
            id: format!("pi_{}", intents.len() + 1),
            client_secret: Some("secret".into()),
            amount_minor: request.amount_minor,
            currency: request.currency.clone(),
            status: "requires_payment_method".into(),
        };
        intents.push(request);
        Ok(intent)
    }

    async fn create_refund(&self, request: ProcessorRefundRequest) -> Result<ProcessorRefund, ProcessorError> {
        self.call().await?;
        let mut refunds = self.refunds.lock().unwrap();
        refunds.push(request);
        Ok(ProcessorRefund { id: format!("re_{}", refunds.len()), status: "succeeded".into() })
    }

    async fn account_balance(&self, _account: Option<&str>) -> Result<ProcessorBalance, ProcessorError> {
        self.call().await?;
        Ok(ProcessorBalance { available: Money::from(100), pending: Money::from(5), currency: "USD".into() })
    }

    async fn create_payout(&self, request: PayoutRequest) -> Result<Payout, ProcessorError> {
        self.call().await?;
        let mut payouts = self.payouts.lock().unwrap();
        payouts.push(request);
        Ok(Payout { id: format!("po_{}", payouts.len()), status: "pending".into() })
    }
}
