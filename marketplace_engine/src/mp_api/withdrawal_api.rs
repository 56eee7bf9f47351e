use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use mkt_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{MessageKind, NewMessage, NewWithdrawal, Seller, Wallet, Withdrawal},
    events::{EventProducers, WithdrawalRecordedEvent},
    mp_api::{
        errors::{MarketplaceError, SideEffectFailure},
        order_flow_api::SYSTEM_SENDER,
    },
    rules::withdrawals::{
        check_withdrawal,
        country_config_or_default,
        eligible_from,
        month_bounds,
        CountryConfig,
        WithdrawalCheck,
        WithdrawalError,
    },
    traits::{MarketplaceDatabase, PaymentProcessor, PayoutRequest, ProcessorBalance, RepositoryError},
};

/// A seller's current withdrawal allowance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalEligibility {
    pub seller_id: String,
    pub eligible_from: DateTime<Utc>,
    pub withdrawals_this_month: u32,
    pub remaining_this_month: u32,
    pub balance: Money,
    pub config: CountryConfig,
}

impl WithdrawalEligibility {
    pub fn can_withdraw_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.eligible_from && self.remaining_this_month > 0 && self.balance >= self.config.min_amount
    }
}

/// The conversation id under which a seller's wallet notifications are posted.
pub fn wallet_conversation_id(seller_id: &str) -> String {
    format!("wallet:{seller_id}")
}

/// Seller withdrawals from their wallet.
pub struct WithdrawalApi<B, P> {
    db: B,
    processor: P,
    producers: EventProducers,
}

impl<B, P> Debug for WithdrawalApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WithdrawalApi")
    }
}

impl<B, P> WithdrawalApi<B, P> {
    pub fn new(db: B, processor: P, producers: EventProducers) -> Self {
        Self { db, processor, producers }
    }
}

impl<B, P> WithdrawalApi<B, P>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    pub async fn eligibility(&self, seller_id: &str) -> Result<WithdrawalEligibility, MarketplaceError> {
        let seller = self.fetch_seller(seller_id).await?;
        let config = country_config_or_default(&seller.country);
        let wallet = self.db.fetch_or_create_wallet(seller_id, &config.currency).await?;
        let used = self.withdrawals_this_month(seller_id, Utc::now()).await?;
        Ok(WithdrawalEligibility {
            seller_id: seller_id.to_string(),
            eligible_from: eligible_from(seller.created_at),
            withdrawals_this_month: used,
            remaining_this_month: config.monthly_limit.saturating_sub(used),
            balance: wallet.balance,
            config,
        })
    }

    /// Withdraws `amount` from the seller's wallet.
    ///
    /// The withdrawal is first reserved: the monthly limit is checked again and the gross amount is debited, with the
    /// seller's wallet locked. Only then, if the seller has a connected processor account, is the net amount (after
    /// tax) paid out to it. A failed payout cancels the reservation and puts the amount back on the balance.
    pub async fn request_withdrawal(&self, seller_id: &str, amount: Money) -> Result<Withdrawal, MarketplaceError> {
        let now = Utc::now();
        let seller = self.fetch_seller(seller_id).await?;
        let config = country_config_or_default(&seller.country);
        let wallet = self.db.fetch_or_create_wallet(seller_id, &config.currency).await?;
        let withdrawals_this_month = self.withdrawals_this_month(seller_id, now).await?;
        let check = WithdrawalCheck { seller: &seller, wallet: &wallet, config: &config, withdrawals_this_month, now };
        let quote = check_withdrawal(&check, amount)?;
        let payout = match &seller.processor_account {
            Some(account) => {
                let amount_minor = quote
                    .net_amount
                    .to_minor_units()
                    .ok_or_else(|| MarketplaceError::invalid(format!("{} cannot be paid out", quote.net_amount)))?;
                Some(PayoutRequest { account: account.clone(), amount_minor, currency: quote.currency.clone() })
            },
            None => None,
        };
        let new_withdrawal = NewWithdrawal {
            seller_id: seller_id.to_string(),
            amount: quote.amount,
            tax: quote.tax,
            net_amount: quote.net_amount,
            currency: quote.currency,
            country: quote.country,
            payout_reference: None,
            created_at: now,
        };
        let (reserved, wallet) = match self.db.record_withdrawal(new_withdrawal, config.monthly_limit).await {
            Ok(reserved) => reserved,
            // Someone else got there first. Work out which limit they used up.
            Err(RepositoryError::Conflict(_)) => return self.recheck_withdrawal(&seller, &config, amount, now).await,
            Err(e) => return Err(e.into()),
        };
        let withdrawal = match payout {
            Some(request) => self.pay_out(reserved, request).await?,
            None => reserved,
        };
        info!(
            "🏦️ Seller {seller_id} withdrew {} {} ({} tax). Balance is now {}",
            withdrawal.amount, withdrawal.currency, withdrawal.tax, wallet.balance
        );
        self.notify(&withdrawal, wallet).await;
        Ok(withdrawal)
    }

    pub async fn withdrawals(&self, seller_id: &str) -> Result<Vec<Withdrawal>, MarketplaceError> {
        Ok(self.db.fetch_withdrawals(seller_id).await?)
    }

    pub async fn wallet(&self, seller_id: &str) -> Result<Wallet, MarketplaceError> {
        let seller = self.fetch_seller(seller_id).await?;
        let currency = country_config_or_default(&seller.country).currency;
        Ok(self.db.fetch_or_create_wallet(seller_id, &currency).await?)
    }

    /// The seller's balance as the payment processor sees it. Requires a connected processor account.
    pub async fn processor_balance(&self, seller_id: &str) -> Result<ProcessorBalance, MarketplaceError> {
        let seller = self.fetch_seller(seller_id).await?;
        let Some(account) = seller.processor_account else {
            return Err(MarketplaceError::invalid(format!("Seller {seller_id} has no payment processor account")));
        };
        Ok(self.processor.account_balance(Some(&account)).await?)
    }

    async fn pay_out(&self, reserved: Withdrawal, request: PayoutRequest) -> Result<Withdrawal, MarketplaceError> {
        let withdrawal_id = reserved.id;
        let account = request.account.clone();
        let payout = match self.processor.create_payout(request).await {
            Ok(payout) => payout,
            Err(e) => {
                warn!("🏦️ Payout for withdrawal #{withdrawal_id} failed: {e}. Cancelling the withdrawal.");
                if let Err(cancel_err) = self.db.cancel_withdrawal(withdrawal_id).await {
                    error!(
                        "🏦️ Withdrawal #{withdrawal_id} of {} was not paid out, and could not be cancelled. Seller {} \
                         needs the amount credited back by hand. {cancel_err}",
                        reserved.amount, reserved.seller_id
                    );
                }
                return Err(e.into());
            },
        };
        debug!("🏦️ Payout {} of {} {} sent to {account}", payout.id, reserved.net_amount, reserved.currency);
        match self.db.settle_withdrawal(withdrawal_id, &payout.id).await {
            Ok(settled) => Ok(settled),
            Err(e) => {
                // The money has left. Reporting a failure here would invite a second payout.
                error!("🏦️ Payout {} was sent, but could not be stored on withdrawal #{withdrawal_id}. {e}", payout.id);
                Ok(Withdrawal { payout_reference: Some(payout.id), ..reserved })
            },
        }
    }

    /// Re-runs the withdrawal checks against the current state, after a concurrent withdrawal used up what the first
    /// check allowed.
    async fn recheck_withdrawal(
        &self,
        seller: &Seller,
        config: &CountryConfig,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal, MarketplaceError> {
        let wallet = self.db.fetch_or_create_wallet(&seller.seller_id, &config.currency).await?;
        let withdrawals_this_month = self.withdrawals_this_month(&seller.seller_id, now).await?;
        let check = WithdrawalCheck { seller, wallet: &wallet, config, withdrawals_this_month, now };
        check_withdrawal(&check, amount)?;
        Err(WithdrawalError::InsufficientBalance { requested: amount, available: wallet.balance }.into())
    }

    async fn withdrawals_this_month(&self, seller_id: &str, now: DateTime<Utc>) -> Result<u32, MarketplaceError> {
        let (start, end) = month_bounds(now);
        Ok(self.db.count_withdrawals_between(seller_id, start, end).await?)
    }

    async fn fetch_seller(&self, seller_id: &str) -> Result<Seller, MarketplaceError> {
        self.db.fetch_seller(seller_id).await?.ok_or_else(|| MarketplaceError::SellerNotFound(seller_id.to_string()))
    }

    async fn notify(&self, withdrawal: &Withdrawal, wallet: Wallet) {
        for producer in &self.producers.withdrawal_recorded_producer {
            let event = WithdrawalRecordedEvent { withdrawal: withdrawal.clone(), wallet: wallet.clone() };
            producer.publish_event(event).await;
        }
        let kind = MessageKind::WithdrawalRequested { amount: withdrawal.amount };
        let message = NewMessage::new(wallet_conversation_id(&withdrawal.seller_id), SYSTEM_SENDER.to_string(), kind);
        if let Err(e) = self.db.insert_message(message).await {
            SideEffectFailure::new(format!("post a withdrawal notice for {}", withdrawal.seller_id), e).log();
        }
    }
}
