//! Deposit and withdrawal flows plus the owner's treasury controls.

use super::core::Engine;
use super::results::EngineError;
use crate::events::{
    AdminWithdrawalEvent, DepositEvent, EventPayload, PriceFeedFundedEvent, TreasuryFundedEvent, WithdrawalEvent,
    WithdrawalRejectedEvent,
};
use crate::treasury::{TreasuryError, WithdrawalReceipt};
use crate::types::{AccountId, Currency, Quote};
use tracing::{info, warn};

impl Engine {
    /// Returns the user's free margin after the deposit.
    pub fn deposit(&mut self, user: AccountId, amount: Quote) -> Result<Quote, EngineError> {
        let free_margin = self.treasury.deposit(user, amount)?;

        info!(user = user.0, %amount, %free_margin, "deposit");
        self.emit_event(EventPayload::Deposit(DepositEvent {
            account_id: user,
            amount,
            free_margin,
        }));
        Ok(free_margin)
    }

    pub fn withdraw(&mut self, user: AccountId, amount: Quote) -> Result<WithdrawalReceipt, EngineError> {
        let receipt = match self.treasury.withdraw(user, amount, self.current_block) {
            Ok(receipt) => receipt,
            Err(e) => {
                // rejections are kept for audit
                warn!(user = user.0, %amount, reason = e.code(), "withdrawal rejected");
                self.emit_event(EventPayload::WithdrawalRejected(WithdrawalRejectedEvent {
                    account_id: user,
                    amount,
                    reason: e.code().to_string(),
                }));
                return Err(EngineError::Treasury(e));
            }
        };

        info!(
            user = user.0,
            %amount,
            from_balance = %receipt.from_balance,
            from_system = %receipt.from_system,
            "withdrawal"
        );
        self.emit_event(EventPayload::Withdrawal(WithdrawalEvent {
            account_id: user,
            amount,
            from_balance: receipt.from_balance,
            from_system: receipt.from_system,
        }));
        Ok(receipt)
    }

    /// System inflow (protocol liquidity). Not credited to any user.
    pub fn fund_treasury(&mut self, amount: Quote) -> Result<Currency, EngineError> {
        let currency_balance = self.treasury.fund(amount)?;
        self.emit_event(EventPayload::TreasuryFunded(TreasuryFundedEvent {
            amount,
            currency_balance,
        }));
        Ok(currency_balance)
    }

    /// Owner drain of currency not owed to users. `all` ignores `amount` and takes the whole surplus.
    pub fn admin_withdraw(&mut self, sender: AccountId, to: AccountId, amount: Quote, all: bool) -> Result<Currency, EngineError> {
        self.ensure_owner(sender)?;
        let withdrawn = self.treasury.admin_withdraw(amount, all)?;

        info!(to = to.0, amount = %withdrawn, "admin withdrawal");
        self.emit_event(EventPayload::AdminWithdrawal(AdminWithdrawalEvent { to, amount: withdrawn }));
        Ok(withdrawn)
    }

    pub fn set_withdrawal_limit(&mut self, sender: AccountId, limit: Quote) -> Result<(), EngineError> {
        self.ensure_owner(sender)?;
        if limit.is_negative() {
            return Err(TreasuryError::InvalidAmount(limit).into());
        }
        let limit = limit.to_currency();
        self.treasury.set_withdrawal_limit(limit);
        self.emit_event(EventPayload::WithdrawalLimitUpdated(limit));
        Ok(())
    }

    pub fn set_system_funds_threshold(&mut self, sender: AccountId, threshold: Quote) -> Result<(), EngineError> {
        self.ensure_owner(sender)?;
        if threshold.is_negative() {
            return Err(TreasuryError::InvalidAmount(threshold).into());
        }
        let threshold = threshold.to_currency();
        self.treasury.set_system_funds_threshold(threshold);
        self.emit_event(EventPayload::SystemFundsThresholdUpdated(threshold));
        Ok(())
    }

    pub fn set_oracle_funding_limit(&mut self, sender: AccountId, limit: Quote) -> Result<(), EngineError> {
        self.ensure_owner(sender)?;
        if limit.is_negative() {
            return Err(TreasuryError::InvalidAmount(limit).into());
        }
        let limit = limit.to_currency();
        self.treasury.set_oracle_funding_limit(limit);
        self.emit_event(EventPayload::OracleFundingLimitUpdated(limit));
        Ok(())
    }

    /// The price feed pays for its own updates out of system funds, under a separate
    /// daily cap. User collateral and the system threshold stay untouched.
    pub fn fund_price_feed(&mut self, sender: AccountId, amount: Quote) -> Result<Currency, EngineError> {
        if sender != self.config.price_feed {
            return Err(EngineError::Unauthorized(sender));
        }
        let funded = self.treasury.fund_oracle(amount, self.current_block)?;

        info!(to = sender.0, amount = %funded, "price feed funded");
        self.emit_event(EventPayload::PriceFeedFunded(PriceFeedFundedEvent { to: sender, amount: funded }));
        Ok(funded)
    }
}
