//! The deterministic single-symbol tick driver: replays quotes and
//! whale events in timestamp order through a [`Strategy`](crate::strategy::Strategy),
//! one synchronous pass per run.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use smol_str::SmolStr;
use tracing::{debug, warn};

use bookwatch_core::config::BacktestConfig;
use bookwatch_core::types::{Quote, WhaleEvent};

use crate::error::BacktestError;
use crate::execution::ExecutionSimulator;
use crate::portfolio::Portfolio;
use crate::result::BacktestResult;
use crate::store::HistoricalStore;
use crate::strategy::{MarketState, Strategy};
use crate::types::{ExitReason, PendingOrder, PositionSide, Signal, SignalAction};

/// Whale events within this window of a quote tick are considered to
/// belong to that tick.
const WHALE_MERGE_WINDOW: TimeDelta = TimeDelta::milliseconds(100);

pub struct BacktestParams {
    pub symbol: SmolStr,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub initial_capital: Decimal,
    pub config: BacktestConfig,
}

/// Runs one deterministic backtest given a strategy and a historical
/// data source. Holds no mutable state of its own between runs.
pub struct BacktestEngine {
    store: Arc<dyn HistoricalStore>,
}

impl BacktestEngine {
    pub fn new(store: Arc<dyn HistoricalStore>) -> Self {
        Self { store }
    }

    pub async fn run(
        &self,
        params: &BacktestParams,
        strategy: &mut dyn Strategy,
    ) -> Result<BacktestResult, BacktestError> {
        if params.config.max_positions == 0 {
            return Err(BacktestError::ConfigInvalid("max_positions must be at least 1".to_string()));
        }
        if params.initial_capital <= Decimal::ZERO {
            return Err(BacktestError::ConfigInvalid("initial_capital must be positive".to_string()));
        }

        let quotes = self
            .store
            .load_quotes(&params.symbol, params.start, params.end)
            .await?;
        let whale_events = self
            .store
            .load_whale_events(&params.symbol, params.start, params.end)
            .await?;

        if quotes.is_empty() {
            warn!(symbol = %params.symbol, "no quote data for requested window");
            return Ok(BacktestResult::data_unavailable(BacktestError::DataUnavailable {
                symbol: params.symbol.to_string(),
                start: params.start.to_rfc3339(),
                end: params.end.to_rfc3339(),
            }));
        }

        let whale_events = whale_events
            .into_iter()
            .filter(|e| e.usd_value >= params.config.min_whale_usd)
            .collect::<Vec<_>>();

        let execution = ExecutionSimulator::from_config(&params.config);
        let mut portfolio = Portfolio::new(params.initial_capital, quotes[0].timestamp);
        strategy.initialize(params.initial_capital);

        let mut whale_idx = 0usize;
        let mut pending_orders: Vec<PendingOrder> = Vec::new();
        let mut insufficient_capital_skips = 0u32;

        for quote in &quotes {
            let market = MarketState { quote };

            while whale_idx < whale_events.len()
                && whale_events[whale_idx].timestamp <= quote.timestamp + WHALE_MERGE_WINDOW
            {
                let event = &whale_events[whale_idx];
                if event.timestamp >= quote.timestamp - WHALE_MERGE_WINDOW {
                    if let Some(signal) = strategy.on_whale_event(event, &market, &portfolio) {
                        self.queue_or_apply(
                            &mut pending_orders,
                            signal,
                            quote,
                            &params.config,
                            &execution,
                            &mut portfolio,
                            &mut insufficient_capital_skips,
                        );
                    }
                }
                whale_idx += 1;
            }

            self.drain_pending(
                &mut pending_orders,
                quote,
                &params.config,
                &execution,
                &mut portfolio,
                &mut insufficient_capital_skips,
            );

            self.check_exits(quote, &execution, &mut portfolio);

            if let Some(signal) = strategy.on_tick(&market, &portfolio) {
                self.queue_or_apply(
                    &mut pending_orders,
                    signal,
                    quote,
                    &params.config,
                    &execution,
                    &mut portfolio,
                    &mut insufficient_capital_skips,
                );
            }

            portfolio.update(quote.mid_price, quote.timestamp);
        }

        let last_quote = quotes.last().expect("checked non-empty above");
        portfolio.close_all_positions(last_quote.timestamp, last_quote.mid_price, last_quote.spread, &execution, ExitReason::BacktestEnd);
        portfolio.finalize_drawdown();

        Ok(BacktestResult::from_portfolio(&portfolio, params.config.risk_free_pct, insufficient_capital_skips))
    }

    #[allow(clippy::too_many_arguments)]
    fn queue_or_apply(
        &self,
        pending_orders: &mut Vec<PendingOrder>,
        signal: Signal,
        quote: &Quote,
        config: &BacktestConfig,
        execution: &ExecutionSimulator,
        portfolio: &mut Portfolio,
        insufficient_capital_skips: &mut u32,
    ) {
        match signal.entry_delay_seconds.filter(|s| *s > 0) {
            Some(delay) => pending_orders.push(PendingOrder {
                execute_at: quote.timestamp + TimeDelta::seconds(delay as i64),
                signal_time: quote.timestamp,
                signal_price: quote.mid_price,
                signal,
            }),
            None => self.apply_signal(signal, quote, config, execution, portfolio, insufficient_capital_skips, None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn drain_pending(
        &self,
        pending_orders: &mut Vec<PendingOrder>,
        quote: &Quote,
        config: &BacktestConfig,
        execution: &ExecutionSimulator,
        portfolio: &mut Portfolio,
        insufficient_capital_skips: &mut u32,
    ) {
        let (ready, still_pending): (Vec<_>, Vec<_>) =
            pending_orders.drain(..).partition(|order| order.execute_at <= quote.timestamp);
        *pending_orders = still_pending;
        for order in ready {
            self.apply_signal(
                order.signal,
                quote,
                config,
                execution,
                portfolio,
                insufficient_capital_skips,
                Some(order.signal_price),
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_signal(
        &self,
        signal: Signal,
        quote: &Quote,
        config: &BacktestConfig,
        execution: &ExecutionSimulator,
        portfolio: &mut Portfolio,
        insufficient_capital_skips: &mut u32,
        delayed_from_price: Option<Decimal>,
    ) {
        let Some(action) = signal.action else { return };

        match action {
            SignalAction::OpenLong | SignalAction::OpenShort => {
                let side = if action == SignalAction::OpenLong {
                    PositionSide::Long
                } else {
                    PositionSide::Short
                };

                let size = signal.size.unwrap_or_else(|| {
                    portfolio.calculate_position_size(
                        quote.mid_price,
                        config.position_size_pct,
                        config.max_risk_per_trade_pct,
                        signal.stop_loss_pct,
                    )
                });
                if size <= Decimal::ZERO {
                    return;
                }

                let fill = match side {
                    PositionSide::Long => execution.simulate_market_buy(quote.mid_price, quote.spread, size),
                    PositionSide::Short => execution.simulate_market_sell(quote.mid_price, quote.spread, size),
                };
                let notional = fill.price * size;

                if !portfolio.can_open_position(notional, config.max_positions) {
                    *insufficient_capital_skips += 1;
                    debug!(?side, %notional, "skipping signal: insufficient capital or max positions reached");
                    return;
                }

                let stop_loss = signal.stop_loss_pct.map(|pct| offset_price(side, fill.price, pct, true));
                let take_profit = signal.take_profit_pct.map(|pct| offset_price(side, fill.price, pct, false));
                let timeout = signal.timeout_seconds.map(|secs| quote.timestamp + TimeDelta::seconds(secs as i64));

                let mut metadata = signal.metadata;
                if let Some(signal_price) = delayed_from_price {
                    metadata.insert("price_offset_from_signal".to_string(), (fill.price - signal_price).to_string());
                }

                portfolio.open_position(
                    quote.symbol.clone(),
                    side,
                    quote.timestamp,
                    fill.price,
                    size,
                    fill.commission,
                    fill.slippage,
                    stop_loss,
                    take_profit,
                    timeout,
                    metadata,
                );
            }
            SignalAction::CloseLong | SignalAction::CloseShort => {
                let wanted = if action == SignalAction::CloseLong {
                    PositionSide::Long
                } else {
                    PositionSide::Short
                };
                if let Some(index) = portfolio.positions().iter().position(|p| p.side == wanted) {
                    let size = portfolio.positions()[index].size;
                    let fill = match wanted {
                        PositionSide::Long => execution.simulate_market_sell(quote.mid_price, quote.spread, size),
                        PositionSide::Short => execution.simulate_market_buy(quote.mid_price, quote.spread, size),
                    };
                    portfolio.close_position(index, quote.timestamp, fill.price, fill.commission, fill.slippage, ExitReason::SignalClose);
                }
            }
        }
    }

    /// Evaluates exit conditions in `stop_loss -> take_profit -> timeout`
    /// order; first match wins.
    fn check_exits(&self, quote: &Quote, execution: &ExecutionSimulator, portfolio: &mut Portfolio) {
        let mut index = 0;
        while index < portfolio.positions().len() {
            let position = &portfolio.positions()[index];
            let reason = if position.should_stop_loss(quote.mid_price) {
                Some(ExitReason::StopLoss)
            } else if position.should_take_profit(quote.mid_price) {
                Some(ExitReason::TakeProfit)
            } else if position.should_timeout(quote.timestamp) {
                Some(ExitReason::Timeout)
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    let size = position.size;
                    let fill = match position.side {
                        PositionSide::Long => execution.simulate_market_sell(quote.mid_price, quote.spread, size),
                        PositionSide::Short => execution.simulate_market_buy(quote.mid_price, quote.spread, size),
                    };
                    portfolio.close_position(index, quote.timestamp, fill.price, fill.commission, fill.slippage, reason);
                }
                None => index += 1,
            }
        }
    }
}

fn offset_price(side: PositionSide, entry_price: Decimal, pct: Decimal, is_stop_loss: bool) -> Decimal {
    let offset = entry_price * pct / Decimal::ONE_HUNDRED;
    match (side, is_stop_loss) {
        (PositionSide::Long, true) => entry_price - offset,
        (PositionSide::Long, false) => entry_price + offset,
        (PositionSide::Short, true) => entry_price + offset,
        (PositionSide::Short, false) => entry_price - offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::strategy::DeepFillReversal;
    use bookwatch_core::types::{EventSide, EventType};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn quote_at(secs: i64, bid: Decimal, ask: Decimal) -> Quote {
        Quote::compute(SmolStr::new("BTC_USDT"), t(secs), bid, ask)
    }

    #[tokio::test]
    async fn deep_fill_reversal_opens_and_exits_on_take_profit() {
        let quotes = vec![
            quote_at(0, dec!(99.9), dec!(100.1)),
            quote_at(1, dec!(99.9), dec!(100.1)),
            quote_at(2, dec!(102.9), dec!(103.1)),
        ];
        let whale_events = vec![WhaleEvent {
            symbol: SmolStr::new("BTC_USDT"),
            timestamp: t(1),
            event_type: EventType::MarketSell,
            side: EventSide::Sell,
            price: dec!(99.9),
            volume: dec!(1500),
            usd_value: dec!(150000),
            distance_from_mid_pct: dec!(-0.2),
            level: 1,
            order_count: 1,
            mid_price: dec!(100),
            best_bid: dec!(99.9),
            best_ask: dec!(100.1),
            spread: dec!(0.2),
            info: String::new(),
        }];

        let store = Arc::new(MemoryStore { quotes, whale_events });
        let engine = BacktestEngine::new(store);
        let mut strategy = DeepFillReversal {
            min_distance_from_mid_pct: dec!(0.1),
            min_market_sell_usd: dec!(100000),
            stop_loss_pct: dec!(1.5),
            take_profit_pct: dec!(3.0),
        };

        let params = BacktestParams {
            symbol: SmolStr::new("BTC_USDT"),
            start: t(0),
            end: t(3),
            initial_capital: dec!(10000),
            config: BacktestConfig {
                taker_fee_pct: Decimal::ZERO,
                maker_fee_pct: Decimal::ZERO,
                slippage_pct: Decimal::ZERO,
                ..Default::default()
            },
        };

        let result = engine.run(&params, &mut strategy).await.unwrap();
        assert_eq!(result.total_trades, 1);
        assert!(result.total_return > Decimal::ZERO);
    }

    #[tokio::test]
    async fn missing_data_is_recorded_not_thrown() {
        let store = Arc::new(MemoryStore::default());
        let engine = BacktestEngine::new(store);
        let mut strategy = DeepFillReversal {
            min_distance_from_mid_pct: dec!(0.1),
            min_market_sell_usd: dec!(100000),
            stop_loss_pct: dec!(1.5),
            take_profit_pct: dec!(3.0),
        };
        let params = BacktestParams {
            symbol: SmolStr::new("BTC_USDT"),
            start: t(0),
            end: t(10),
            initial_capital: dec!(10000),
            config: BacktestConfig::default(),
        };
        let result = engine.run(&params, &mut strategy).await.unwrap();
        assert!(result.data_unavailable);
        assert_eq!(result.total_trades, 0);
    }
}
