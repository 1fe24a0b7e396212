// 6.0 treasury.rs: custody of collateral currency.
// two views per user: free margin (position-layer, what can back new positions or be withdrawn)
// and realized balance (treasury currency from net profit on settled closes).
// the treasury also tracks total user collateral (free margin plus margin locked in
// positions); that, not the realized balances alone, is what custody owes users.
// withdrawals past the realized balance draw on shared system funds and go through
// the rolling daily limit and the system funds threshold.

use crate::types::{AccountId, BlockNumber, Currency, Quote};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreasuryError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Quote),

    #[error("insufficient free margin: needed {needed}, available {available}")]
    InsufficientFreeMargin { needed: Quote, available: Quote },

    #[error("daily withdrawal limit exceeded: {attempted} on top of {withdrawn} with limit {limit}")]
    DailyLimit {
        attempted: Currency,
        withdrawn: Currency,
        limit: Currency,
    },

    #[error("daily price feed funding limit exceeded: {attempted} on top of {funded} with limit {limit}")]
    OracleFundingLimit {
        attempted: Currency,
        funded: Currency,
        limit: Currency,
    },

    #[error("payout would leave treasury {remaining} below required {required}")]
    SystemThreshold { remaining: Currency, required: Currency },

    #[error("treasury holds {available}, cannot pay out {requested}")]
    InsufficientCustody { requested: Currency, available: Currency },

    #[error("system surplus {surplus} is less than requested {requested}")]
    InsufficientSurplus { requested: Currency, surplus: Currency },

    #[error("fixed point overflow")]
    Overflow,
}

impl TreasuryError {
    pub fn code(&self) -> &'static str {
        match self {
            TreasuryError::InvalidAmount(_) => "!amount",
            TreasuryError::InsufficientFreeMargin { .. } => "!balance",
            TreasuryError::DailyLimit { .. } => "!daily_limit",
            TreasuryError::OracleFundingLimit { .. } => "!oracle_limit",
            TreasuryError::SystemThreshold { .. } => "!system_threshold",
            TreasuryError::InsufficientCustody { .. } => "!funds",
            TreasuryError::InsufficientSurplus { .. } => "!balance2",
            TreasuryError::Overflow => "!failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryAccount {
    pub free_margin: Quote,
    pub balance: Currency,
}

impl Default for TreasuryAccount {
    fn default() -> Self {
        Self {
            free_margin: Quote::zero(),
            balance: Currency::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryLimits {
    pub daily_withdrawal_limit: Currency,
    pub system_funds_threshold: Currency,
    pub daily_oracle_funding_limit: Currency,
    /// Length of the rolling withdrawal window, in blocks.
    pub daily_block_count: u64,
}

// how a successful withdrawal was sourced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub amount: Currency,
    pub from_balance: Currency,
    pub from_system: Currency,
    pub free_margin: Quote,
}

/// Rolling per-window outflow counter. The window restarts once more than
/// `span` blocks have passed since its checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutflowWindow {
    pub checkpoint: BlockNumber,
    pub since_checkpoint: Currency,
}

impl Default for OutflowWindow {
    fn default() -> Self {
        Self {
            checkpoint: BlockNumber(0),
            since_checkpoint: Currency::zero(),
        }
    }
}

impl OutflowWindow {
    // the window as it would look after paying `amount` at `now`, or None past the limit
    fn admit(&self, now: BlockNumber, span: u64, amount: Currency, limit: Currency) -> Result<Option<Self>, TreasuryError> {
        let current = if now.blocks_since(self.checkpoint) > span {
            Self {
                checkpoint: now,
                since_checkpoint: Currency::zero(),
            }
        } else {
            *self
        };
        let total = current.since_checkpoint.checked_add(amount).ok_or(TreasuryError::Overflow)?;
        if total > limit {
            return Ok(None);
        }
        Ok(Some(Self {
            checkpoint: current.checkpoint,
            since_checkpoint: total,
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Treasury {
    accounts: HashMap<AccountId, TreasuryAccount>,
    currency_balance: Currency,
    total_user_balance: Currency,
    total_collateral: Quote,
    limits: TreasuryLimits,
    withdrawals: OutflowWindow,
    oracle_funding: OutflowWindow,
}

impl Treasury {
    pub fn new(limits: TreasuryLimits) -> Self {
        Self {
            accounts: HashMap::new(),
            currency_balance: Currency::zero(),
            total_user_balance: Currency::zero(),
            total_collateral: Quote::zero(),
            limits,
            withdrawals: OutflowWindow::default(),
            oracle_funding: OutflowWindow::default(),
        }
    }

    pub fn account(&self, user: AccountId) -> TreasuryAccount {
        self.accounts.get(&user).copied().unwrap_or_default()
    }

    pub fn free_margin(&self, user: AccountId) -> Quote {
        self.account(user).free_margin
    }

    pub fn balance(&self, user: AccountId) -> Currency {
        self.account(user).balance
    }

    pub fn currency_balance(&self) -> Currency {
        self.currency_balance
    }

    pub fn total_user_balance(&self) -> Currency {
        self.total_user_balance
    }

    /// Free margin plus margin locked in open positions, summed over all users.
    pub fn total_collateral(&self) -> Quote {
        self.total_collateral
    }

    /// Everything custody owes users. A realized balance is always part of that
    /// user's collateral, so this is normally just the collateral total.
    pub fn total_owed(&self) -> Currency {
        self.total_collateral.to_currency().max(self.total_user_balance)
    }

    pub fn limits(&self) -> TreasuryLimits {
        self.limits
    }

    pub fn withdrawal_checkpoint(&self) -> BlockNumber {
        self.withdrawals.checkpoint
    }

    pub fn withdrawals_since_checkpoint(&self) -> Currency {
        self.withdrawals.since_checkpoint
    }

    pub fn oracle_funding_window(&self) -> OutflowWindow {
        self.oracle_funding
    }

    // treasury currency not owed to anyone
    pub fn system_surplus(&self) -> Currency {
        self.currency_balance.saturating_sub(self.total_owed())
    }

    // 6.1: deposit. currency goes into custody and shows up as free margin only.
    pub fn deposit(&mut self, user: AccountId, amount: Quote) -> Result<Quote, TreasuryError> {
        if !amount.is_positive() {
            return Err(TreasuryError::InvalidAmount(amount));
        }
        let currency_balance = self
            .currency_balance
            .checked_add(amount.to_currency())
            .ok_or(TreasuryError::Overflow)?;
        let collateral = self.total_collateral.checked_add(amount).ok_or(TreasuryError::Overflow)?;
        let free_margin = self
            .free_margin(user)
            .checked_add(amount)
            .ok_or(TreasuryError::Overflow)?;

        self.currency_balance = currency_balance;
        self.total_collateral = collateral;
        self.accounts.entry(user).or_default().free_margin = free_margin;
        Ok(free_margin)
    }

    /// External inflow that belongs to the system, not to any user.
    pub fn fund(&mut self, amount: Quote) -> Result<Currency, TreasuryError> {
        if !amount.is_positive() {
            return Err(TreasuryError::InvalidAmount(amount));
        }
        self.currency_balance = self
            .currency_balance
            .checked_add(amount.to_currency())
            .ok_or(TreasuryError::Overflow)?;
        Ok(self.currency_balance)
    }

    pub fn ensure_free_margin(&self, user: AccountId, needed: Quote) -> Result<(), TreasuryError> {
        let available = self.free_margin(user);
        if available < needed {
            return Err(TreasuryError::InsufficientFreeMargin { needed, available });
        }
        Ok(())
    }

    // 6.2: margin moves between free margin and open positions. locking keeps it
    // inside the user's collateral.

    pub(crate) fn lock_margin(&mut self, user: AccountId, amount: Quote) -> Result<Quote, TreasuryError> {
        self.ensure_free_margin(user, amount)?;
        let account = self.accounts.entry(user).or_default();
        account.free_margin = account.free_margin.sub(amount);
        Ok(account.free_margin)
    }

    /// A position gave back `returned` for `margin_closed` of locked margin. Free margin
    /// gets what came back; the realized balance moves by the net result only.
    /// Returns the net result.
    pub(crate) fn settle_close(&mut self, user: AccountId, margin_closed: Quote, returned: Quote) -> Result<Quote, TreasuryError> {
        let net = returned.checked_sub(margin_closed).ok_or(TreasuryError::Overflow)?;
        let collateral = self.total_collateral.checked_add(net).ok_or(TreasuryError::Overflow)?;
        let free_margin = self
            .free_margin(user)
            .checked_add(returned)
            .ok_or(TreasuryError::Overflow)?;

        if net.is_positive() {
            self.pay_to_user(user, net.to_currency())?;
        } else if net.is_negative() {
            self.collect_from_user(user, net.abs().to_currency());
        }
        self.total_collateral = collateral;
        self.accounts.entry(user).or_default().free_margin = free_margin;
        Ok(net)
    }

    // liquidation reward: carved out of someone else's locked margin, lands as free margin
    pub(crate) fn credit_reward(&mut self, user: AccountId, reward: Quote) -> Result<Quote, TreasuryError> {
        let collateral = self.total_collateral.checked_add(reward).ok_or(TreasuryError::Overflow)?;
        let free_margin = self
            .free_margin(user)
            .checked_add(reward)
            .ok_or(TreasuryError::Overflow)?;
        self.total_collateral = collateral;
        self.accounts.entry(user).or_default().free_margin = free_margin;
        Ok(free_margin)
    }

    pub(crate) fn pay_to_user(&mut self, user: AccountId, amount: Currency) -> Result<Currency, TreasuryError> {
        let total = self
            .total_user_balance
            .checked_add(amount)
            .ok_or(TreasuryError::Overflow)?;
        let account = self.accounts.entry(user).or_default();
        account.balance = account.balance.checked_add(amount).ok_or(TreasuryError::Overflow)?;
        self.total_user_balance = total;
        Ok(account.balance)
    }

    // clamped at the user's balance. returns what was actually collected.
    pub(crate) fn collect_from_user(&mut self, user: AccountId, amount: Currency) -> Currency {
        let account = self.accounts.entry(user).or_default();
        let collected = amount.min(account.balance);
        account.balance = account.balance.saturating_sub(collected);
        self.total_user_balance = self.total_user_balance.saturating_sub(collected);
        collected
    }

    // 6.3: user withdrawal. own realized balance first, system funds for the rest.
    // daily limit is checked before the system threshold. nothing mutates until both pass.
    pub fn withdraw(&mut self, user: AccountId, amount: Quote, now: BlockNumber) -> Result<WithdrawalReceipt, TreasuryError> {
        if !amount.is_positive() {
            return Err(TreasuryError::InvalidAmount(amount));
        }
        self.ensure_free_margin(user, amount)?;

        let requested = amount.to_currency();
        let own = requested.min(self.balance(user));
        let excess = requested.saturating_sub(own);
        let collateral = self.total_collateral.checked_sub(amount).ok_or(TreasuryError::Overflow)?;

        let mut window = self.withdrawals;
        if excess.is_zero() {
            if self.currency_balance < requested {
                return Err(TreasuryError::InsufficientCustody {
                    requested,
                    available: self.currency_balance,
                });
            }
        } else {
            let limit = self.limits.daily_withdrawal_limit;
            window = self
                .withdrawals
                .admit(now, self.limits.daily_block_count, requested, limit)?
                .ok_or(TreasuryError::DailyLimit {
                    attempted: requested,
                    withdrawn: self.withdrawals.since_checkpoint,
                    limit,
                })?;

            // what everyone is still owed once this user's collateral and balance shrink
            let owed_after = collateral
                .to_currency()
                .max(self.total_user_balance.saturating_sub(own));
            self.ensure_headroom(requested, owed_after)?;
        }

        self.collect_from_user(user, own);
        let account = self.accounts.entry(user).or_default();
        account.free_margin = account.free_margin.sub(amount);
        let free_margin = account.free_margin;
        self.total_collateral = collateral;
        self.currency_balance = self.currency_balance.saturating_sub(requested);
        self.withdrawals = window;

        Ok(WithdrawalReceipt {
            amount: requested,
            from_balance: own,
            from_system: excess,
            free_margin,
        })
    }

    // paying `amount` out must leave `owed` plus the threshold in custody
    fn ensure_headroom(&self, amount: Currency, owed: Currency) -> Result<(), TreasuryError> {
        let required = owed
            .checked_add(self.limits.system_funds_threshold)
            .ok_or(TreasuryError::Overflow)?;
        if self.currency_balance < amount || self.currency_balance.saturating_sub(amount) < required {
            return Err(TreasuryError::SystemThreshold {
                remaining: self.currency_balance.saturating_sub(amount),
                required,
            });
        }
        Ok(())
    }

    // 6.4: admin drain of system surplus. `all` takes everything not owed to users.
    pub fn admin_withdraw(&mut self, amount: Quote, all: bool) -> Result<Currency, TreasuryError> {
        let surplus = self.system_surplus();
        let requested = if all { surplus } else { amount.to_currency() };
        if !all && !amount.is_positive() {
            return Err(TreasuryError::InvalidAmount(amount));
        }
        if requested > surplus {
            return Err(TreasuryError::InsufficientSurplus { requested, surplus });
        }
        self.currency_balance = self.currency_balance.saturating_sub(requested);
        Ok(requested)
    }

    // 6.5: the price feed tops itself up from system funds, capped per window
    pub fn fund_oracle(&mut self, amount: Quote, now: BlockNumber) -> Result<Currency, TreasuryError> {
        if !amount.is_positive() {
            return Err(TreasuryError::InvalidAmount(amount));
        }
        let requested = amount.to_currency();
        let limit = self.limits.daily_oracle_funding_limit;
        let window = self
            .oracle_funding
            .admit(now, self.limits.daily_block_count, requested, limit)?
            .ok_or(TreasuryError::OracleFundingLimit {
                attempted: requested,
                funded: self.oracle_funding.since_checkpoint,
                limit,
            })?;
        self.ensure_headroom(requested, self.total_owed())?;

        self.currency_balance = self.currency_balance.saturating_sub(requested);
        self.oracle_funding = window;
        Ok(requested)
    }

    pub fn set_withdrawal_limit(&mut self, limit: Currency) {
        self.limits.daily_withdrawal_limit = limit;
    }

    pub fn set_system_funds_threshold(&mut self, threshold: Currency) {
        self.limits.system_funds_threshold = threshold;
    }

    pub fn set_oracle_funding_limit(&mut self, limit: Currency) {
        self.limits.daily_oracle_funding_limit = limit;
    }
}
