use std::{
    net::IpAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex,
    },
};

use marketplace_engine::traits::{
    CountryResolver,
    GeoLookupError,
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
use mockall::mock;

mock! {
    pub Geo {}
    impl CountryResolver for Geo {
        async fn country_for_ip(&self, ip: IpAddr) -> Result<String, GeoLookupError>;
    }
}

/// A payment processor that remembers what it was asked to do. Clones share their history, so a test can keep one
/// copy and hand another to the server.
#[derive(Clone, Default)]
pub struct RecordingProcessor {
    down: Arc<AtomicBool>,
    pub intents: Arc<Mutex<Vec<PaymentIntentRequest>>>,
    pub refunds: Arc<Mutex<Vec<ProcessorRefundRequest>>>,
    pub payouts: Arc<Mutex<Vec<PayoutRequest>>>,
}

impl RecordingProcessor {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check_up(&self) -> Result<(), ProcessorError> {
        if self.down.load(Ordering::SeqCst) {
            Err(ProcessorError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl PaymentProcessor for RecordingProcessor {
    async fn create_payment_intent(&self, request: PaymentIntentRequest) -> Result<PaymentIntent, ProcessorError> {
        self.check_up()?;
        let mut intents = self.intents.lock().unwrap();
        let intent = PaymentIntent {
            id: format!("pi_test_{}", intents.len() + 1),
            client_secret: Some("pi_secret_test".into()),
            amount_minor: request.amount_minor,
            currency: request.currency.clone(),
            status: "requires_payment_method".into(),
        };
        intents.push(request);
        Ok(intent)
    }

    async fn create_refund(&self, request: ProcessorRefundRequest) -> Result<ProcessorRefund, ProcessorError> {
        self.check_up()?;
        let mut refunds = self.refunds.lock().unwrap();
        refunds.push(request);
        Ok(ProcessorRefund { id: format!("re_test_{}", refunds.len()), status: "succeeded".into() })
    }

    async fn account_balance(&self, _account: Option<&str>) -> Result<ProcessorBalance, ProcessorError> {
        self.check_up()?;
        Ok(ProcessorBalance { available: Money::from(250), pending: Money::zero(), currency: "USD".into() })
    }

    async fn create_payout(&self, request: PayoutRequest) -> Result<Payout, ProcessorError> {
        self.check_up()?;
        let mut payouts = self.payouts.lock().unwrap();
        payouts.push(request);
        Ok(Payout { id: format!("po_test_{}", payouts.len()), status: "pending".into() })
    }
}
