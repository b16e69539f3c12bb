//! Position/trade/equity/signal types owned exclusively by a single
//! backtest run's [`crate::portfolio::Portfolio`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Timeout,
    SignalClose,
    BacktestEnd,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::Timeout => "timeout",
            ExitReason::SignalClose => "signal_close",
            ExitReason::BacktestEnd => "backtest_end",
        };
        write!(f, "{s}")
    }
}

/// An open position. Owned exclusively by the [`crate::portfolio::Portfolio`]
/// that created it; destroyed on close.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: smol_str::SmolStr,
    pub side: PositionSide,
    pub entry_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub size: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub timeout: Option<DateTime<Utc>>,
    pub entry_commission: Decimal,
    pub entry_slippage: Decimal,
    pub unrealized_pnl: Decimal,
    pub metadata: HashMap<String, String>,
}

impl Position {
    pub fn update_pnl(&mut self, current_price: Decimal) {
        self.unrealized_pnl = match self.side {
            PositionSide::Long => (current_price - self.entry_price) * self.size,
            PositionSide::Short => (self.entry_price - current_price) * self.size,
        };
    }

    pub fn should_stop_loss(&self, current_price: Decimal) -> bool {
        match (self.side, self.stop_loss) {
            (PositionSide::Long, Some(sl)) => current_price <= sl,
            (PositionSide::Short, Some(sl)) => current_price >= sl,
            (_, None) => false,
        }
    }

    pub fn should_take_profit(&self, current_price: Decimal) -> bool {
        match (self.side, self.take_profit) {
            (PositionSide::Long, Some(tp)) => current_price >= tp,
            (PositionSide::Short, Some(tp)) => current_price <= tp,
            (_, None) => false,
        }
    }

    pub fn should_timeout(&self, now: DateTime<Utc>) -> bool {
        matches!(self.timeout, Some(t) if now >= t)
    }
}

/// A closed position.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: smol_str::SmolStr,
    pub side: PositionSide,
    pub entry_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_time: DateTime<Utc>,
    pub exit_price: Decimal,
    pub size: Decimal,
    pub realized_pnl: Decimal,
    pub pnl_pct: Decimal,
    pub commission: Decimal,
    pub slippage: Decimal,
    pub exit_reason: ExitReason,
    pub metadata: HashMap<String, String>,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.realized_pnl > Decimal::ZERO
    }

    pub fn duration(&self) -> chrono::TimeDelta {
        self.exit_time - self.entry_time
    }
}

/// One sample of the portfolio's equity curve, recorded every processed
/// tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub cash: Decimal,
    pub unrealized_pnl: Decimal,
    pub equity: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
}

/// What a [`crate::strategy::Strategy`] hands back from `on_whale_event`/
/// `on_tick`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signal {
    pub action: Option<SignalAction>,
    pub stop_loss_pct: Option<Decimal>,
    pub take_profit_pct: Option<Decimal>,
    pub timeout_seconds: Option<u64>,
    pub entry_delay_seconds: Option<u64>,
    pub size: Option<Decimal>,
    pub metadata: HashMap<String, String>,
}

impl Signal {
    pub fn open(action: SignalAction) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }
}

/// A signal queued for delayed ("manual") execution.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrder {
    pub signal: Signal,
    pub signal_time: DateTime<Utc>,
    pub signal_price: Decimal,
    pub execute_at: DateTime<Utc>,
}
