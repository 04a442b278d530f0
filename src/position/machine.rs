//! Per-position state machine
//!
//! One machine owns one [`Position`] for its whole lifecycle:
//! `Opening -> Monitoring -> Exiting -> Closed`, with `FailedOpen` terminal
//! from `Opening`. The machine is synchronous; it consumes ticks and
//! execution outcomes and returns the actions the caller must perform, which
//! keeps every transition unit-testable without a runtime.

use super::{Position, PositionState};
use crate::events::EngineEvent;
use crate::execution::{IntentKind, OrderIntent, OrderResult};
use crate::feed::PriceTick;
use crate::model;
use crate::policy::{compute_levels, PolicyConfig};
use chrono::Utc;
use rust_decimal::Decimal;

/// Side effects requested by a transition
#[derive(Debug, Clone)]
pub enum MachineAction {
    /// Submit an order intent (kind decides close vs best-effort adjust)
    Submit(OrderIntent),
    /// Publish a lifecycle event
    Emit(EngineEvent),
    /// Remove this position from the registry; the machine is done
    Deregister,
}

/// State machine for a single position
pub struct PositionMachine {
    position: Position,
    policy: PolicyConfig,
    atr_window: usize,
    retry_budget: u32,
    history: Vec<PriceTick>,
    history_cap: usize,
    close_attempts: u32,
    adjust_seq: u32,
    exit_in_flight: bool,
    alerted: bool,
    last_atr: Option<Decimal>,
}

impl PositionMachine {
    /// Create a machine for a position awaiting entry confirmation
    pub fn new(
        position: Position,
        policy: PolicyConfig,
        atr_window: usize,
        retry_budget: u32,
    ) -> Self {
        let history_cap = (atr_window * 4 + 2).max(64);
        Self {
            position,
            policy,
            atr_window,
            retry_budget,
            history: Vec::new(),
            history_cap,
            close_attempts: 0,
            adjust_seq: 0,
            exit_in_flight: false,
            alerted: false,
            last_atr: None,
        }
    }

    /// Current position snapshot
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Whether a close intent is currently in flight
    pub fn exit_in_flight(&self) -> bool {
        self.exit_in_flight
    }

    /// Latest ATR used for level computation, if any
    pub fn current_atr(&self) -> Option<Decimal> {
        self.last_atr
    }

    /// The entry intent for this position (sequence 0)
    pub fn entry_intent(&self) -> OrderIntent {
        OrderIntent::new(
            self.position.id,
            IntentKind::Open,
            self.position.instrument.clone(),
            self.position.side,
            self.position.size,
            self.position.entry_price,
            0,
        )
    }

    fn push_history(&mut self, tick: PriceTick) {
        self.history.push(tick);
        if self.history.len() > self.history_cap {
            let excess = self.history.len() - self.history_cap;
            self.history.drain(..excess);
        }
    }

    fn refresh_levels(&mut self) -> Option<Decimal> {
        let vol = model::estimate(&self.history, self.atr_window).ok()?;
        self.last_atr = Some(vol.value);
        let levels = compute_levels(&self.position, &vol, &self.policy);
        self.position.current_stop = Some(levels.stop);
        self.position.current_take_profit = Some(levels.take_profit);
        Some(levels.stop)
    }

    /// Feed one price tick through the machine
    ///
    /// Ticks for terminal machines and foreign instruments are dropped.
    pub fn on_tick(&mut self, tick: &PriceTick) -> Vec<MachineAction> {
        if self.position.state.is_terminal() || tick.instrument != self.position.instrument {
            return vec![];
        }
        self.push_history(tick.clone());

        match self.position.state {
            PositionState::Opening => vec![],
            PositionState::Monitoring => self.evaluate(tick),
            PositionState::Exiting => {
                // Stay responsive while a close is in flight: keep the
                // ratchet current, but emit no intents.
                self.position.observe(tick.close);
                self.refresh_levels();
                vec![]
            }
            PositionState::Closed | PositionState::FailedOpen => unreachable!(),
        }
    }

    fn evaluate(&mut self, tick: &PriceTick) -> Vec<MachineAction> {
        let mut actions = Vec::new();
        self.position.observe(tick.close);

        let old_stop = self.position.current_stop;
        let Some(new_stop) = self.refresh_levels() else {
            return actions;
        };

        if let Some(breach) = self.position.breached(tick.close) {
            self.position.state = PositionState::Exiting;
            self.exit_in_flight = true;
            self.close_attempts += 1;
            actions.push(MachineAction::Emit(EngineEvent::Exiting {
                position_id: self.position.id,
                instrument: self.position.instrument.clone(),
                trigger_price: tick.close,
                breach,
            }));
            actions.push(MachineAction::Submit(OrderIntent::new(
                self.position.id,
                IntentKind::Close,
                self.position.instrument.clone(),
                self.position.side,
                self.position.size,
                tick.close,
                self.close_attempts,
            )));
        } else if old_stop != Some(new_stop) {
            self.adjust_seq += 1;
            actions.push(MachineAction::Emit(EngineEvent::StopAdjusted {
                position_id: self.position.id,
                instrument: self.position.instrument.clone(),
                old_stop,
                new_stop,
            }));
            actions.push(MachineAction::Submit(OrderIntent::new(
                self.position.id,
                IntentKind::AdjustStop,
                self.position.instrument.clone(),
                self.position.side,
                self.position.size,
                new_stop,
                self.adjust_seq,
            )));
        }
        actions
    }

    /// Handle the outcome of the entry intent
    pub fn on_entry_result(&mut self, result: OrderResult) -> Vec<MachineAction> {
        if self.position.state != PositionState::Opening {
            return vec![];
        }
        match result {
            OrderResult::Acknowledged { fill_price } => {
                self.position.entry_price = fill_price;
                self.position.high_water_mark = fill_price;
                self.position.opened_at = Utc::now();
                self.position.state = PositionState::Monitoring;
                // Levels need a volatility reading; with no history yet they
                // are initialized on the first monitored tick instead.
                self.refresh_levels();
                vec![MachineAction::Emit(EngineEvent::Opened {
                    position_id: self.position.id,
                    instrument: self.position.instrument.clone(),
                    side: self.position.side,
                    entry_price: fill_price,
                    stop: self.position.current_stop,
                    take_profit: self.position.current_take_profit,
                })]
            }
            OrderResult::Rejected { reason } => self.fail_open(reason),
            OrderResult::TimedOut => self.fail_open("entry confirmation timed out".to_string()),
        }
    }

    fn fail_open(&mut self, reason: String) -> Vec<MachineAction> {
        self.position.state = PositionState::FailedOpen;
        vec![
            MachineAction::Emit(EngineEvent::Failed {
                position_id: self.position.id,
                instrument: self.position.instrument.clone(),
                reason,
            }),
            MachineAction::Deregister,
        ]
    }

    /// Handle the outcome of a close intent
    pub fn on_close_result(&mut self, result: OrderResult) -> Vec<MachineAction> {
        if self.position.state != PositionState::Exiting || !self.exit_in_flight {
            return vec![];
        }
        self.exit_in_flight = false;
        match result {
            OrderResult::Acknowledged { fill_price } => {
                self.position.state = PositionState::Closed;
                vec![
                    MachineAction::Emit(EngineEvent::Closed {
                        position_id: self.position.id,
                        instrument: self.position.instrument.clone(),
                        exit_price: fill_price,
                    }),
                    MachineAction::Deregister,
                ]
            }
            OrderResult::Rejected { .. } | OrderResult::TimedOut => {
                if self.close_attempts < self.retry_budget {
                    // Back to monitoring: the next tick re-evaluates levels
                    // against the latest price before any retry.
                    self.position.state = PositionState::Monitoring;
                    vec![]
                } else if !self.alerted {
                    self.alerted = true;
                    vec![MachineAction::Emit(EngineEvent::Alert {
                        position_id: self.position.id,
                        instrument: self.position.instrument.clone(),
                        message: format!(
                            "close unconfirmed after {} attempts, operator action required",
                            self.close_attempts
                        ),
                    })]
                } else {
                    vec![]
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Side;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn policy() -> PolicyConfig {
        PolicyConfig {
            atr_multiplier: dec!(2),
            take_profit_ratio: dec!(0.05),
            trailing_enabled: true,
            stop_min_distance: dec!(0.001),
            breakeven_enabled: false,
            ..PolicyConfig::default()
        }
    }

    fn machine(side: Side, retry_budget: u32) -> PositionMachine {
        let position = Position::opening("BTC-USDT-SWAP", side, dec!(100), dec!(1), 3);
        PositionMachine::new(position, policy(), 14, retry_budget)
    }

    fn tick(i: i64, close: f64) -> PriceTick {
        let close = Decimal::try_from(close).unwrap();
        PriceTick {
            instrument: "BTC-USDT-SWAP".to_string(),
            timestamp: Utc::now() + Duration::minutes(i),
            high: close + dec!(0.75),
            low: close - dec!(0.75),
            close,
        }
    }

    /// Seed a calm tape (constant TR of 1.5) and confirm the entry fill
    fn opened_machine(side: Side, retry_budget: u32) -> PositionMachine {
        let mut m = machine(side, retry_budget);
        for i in 0..15 {
            m.on_tick(&tick(i, 100.0));
        }
        let actions = m.on_entry_result(OrderResult::Acknowledged {
            fill_price: dec!(100),
        });
        assert!(matches!(
            actions.as_slice(),
            [MachineAction::Emit(EngineEvent::Opened { .. })]
        ));
        m
    }

    fn close_intents(actions: &[MachineAction]) -> Vec<&OrderIntent> {
        actions
            .iter()
            .filter_map(|a| match a {
                MachineAction::Submit(i) if i.kind == IntentKind::Close => Some(i),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_entry_intent_key() {
        let m = machine(Side::Long, 3);
        let intent = m.entry_intent();
        assert_eq!(intent.kind, IntentKind::Open);
        assert!(intent.idempotency_key.ends_with(":open:0"));
    }

    #[test]
    fn test_ticks_ignored_while_opening() {
        let mut m = machine(Side::Long, 3);
        assert!(m.on_tick(&tick(0, 100.0)).is_empty());
        assert_eq!(m.position().state, PositionState::Opening);
    }

    #[test]
    fn test_entry_ack_initializes_levels() {
        let m = opened_machine(Side::Long, 3);
        let pos = m.position();
        assert_eq!(pos.state, PositionState::Monitoring);
        // ATR on the calm tape is exactly 1.5: stop 97, tp 105
        assert_eq!(pos.current_stop, Some(dec!(97.0)));
        assert_eq!(pos.current_take_profit, Some(dec!(105.00)));
    }

    #[test]
    fn test_entry_ack_without_history_defers_levels() {
        let mut m = machine(Side::Long, 3);
        m.on_entry_result(OrderResult::Acknowledged {
            fill_price: dec!(100),
        });
        assert!(m.position().current_stop.is_none());
        // First monitored tick places the initial levels
        let actions = m.on_tick(&tick(0, 100.0));
        assert!(m.position().current_stop.is_some());
        assert!(actions
            .iter()
            .any(|a| matches!(a, MachineAction::Emit(EngineEvent::StopAdjusted { .. }))));
    }

    #[test]
    fn test_entry_rejection_fails_open() {
        let mut m = machine(Side::Long, 3);
        let actions = m.on_entry_result(OrderResult::Rejected {
            reason: "invalid instrument".to_string(),
        });
        assert_eq!(m.position().state, PositionState::FailedOpen);
        assert!(actions
            .iter()
            .any(|a| matches!(a, MachineAction::Emit(EngineEvent::Failed { .. }))));
        assert!(actions
            .iter()
            .any(|a| matches!(a, MachineAction::Deregister)));
    }

    #[test]
    fn test_entry_timeout_fails_open() {
        let mut m = machine(Side::Long, 3);
        m.on_entry_result(OrderResult::TimedOut);
        assert_eq!(m.position().state, PositionState::FailedOpen);
    }

    #[test]
    fn test_trailing_tightens_and_emits_adjust() {
        let mut m = opened_machine(Side::Long, 3);
        let actions = m.on_tick(&tick(20, 103.0));
        let stop = m.position().current_stop.unwrap();
        assert!(stop > dec!(97));
        assert!(actions
            .iter()
            .any(|a| matches!(a, MachineAction::Emit(EngineEvent::StopAdjusted { .. }))));
        assert!(actions.iter().any(|a| matches!(
            a,
            MachineAction::Submit(i) if i.kind == IntentKind::AdjustStop
        )));
    }

    #[test]
    fn test_stop_monotonic_over_tape() {
        // Ratchet invariant: a long's stop never decreases across any tape
        let mut m = opened_machine(Side::Long, 3);
        let closes = [100.5, 101.0, 102.5, 101.5, 103.0, 102.0, 102.8, 101.9];
        let mut last_stop = m.position().current_stop.unwrap();
        for (i, c) in closes.iter().enumerate() {
            m.on_tick(&tick(20 + i as i64, *c));
            if m.position().state != PositionState::Monitoring {
                break;
            }
            let stop = m.position().current_stop.unwrap();
            assert!(stop >= last_stop, "stop loosened: {last_stop} -> {stop}");
            last_stop = stop;
        }
    }

    #[test]
    fn test_stop_breach_emits_single_close() {
        let mut m = opened_machine(Side::Long, 3);
        m.on_tick(&tick(20, 103.0));
        // Dip through the ratcheted stop
        let actions = m.on_tick(&tick(21, 99.5));
        assert_eq!(m.position().state, PositionState::Exiting);
        assert!(m.exit_in_flight());
        let closes = close_intents(&actions);
        assert_eq!(closes.len(), 1);
        assert_eq!(closes[0].trigger_price, dec!(99.5));
        assert!(actions.iter().any(|a| matches!(
            a,
            MachineAction::Emit(EngineEvent::Exiting { breach: crate::position::Breach::Stop, .. })
        )));
    }

    #[test]
    fn test_take_profit_breach() {
        let mut m = opened_machine(Side::Long, 3);
        let actions = m.on_tick(&tick(20, 105.5));
        assert_eq!(m.position().state, PositionState::Exiting);
        assert!(actions.iter().any(|a| matches!(
            a,
            MachineAction::Emit(EngineEvent::Exiting {
                breach: crate::position::Breach::TakeProfit,
                ..
            })
        )));
    }

    #[test]
    fn test_no_second_close_while_exiting() {
        let mut m = opened_machine(Side::Long, 3);
        m.on_tick(&tick(20, 103.0));
        let first = m.on_tick(&tick(21, 99.5));
        assert_eq!(close_intents(&first).len(), 1);
        // A second breaching tick arrives before the close resolves
        let second = m.on_tick(&tick(22, 99.0));
        assert!(close_intents(&second).is_empty());
        assert!(second.is_empty());
    }

    #[test]
    fn test_close_ack_closes_and_deregisters() {
        let mut m = opened_machine(Side::Long, 3);
        m.on_tick(&tick(20, 96.0));
        let actions = m.on_close_result(OrderResult::Acknowledged {
            fill_price: dec!(95.9),
        });
        assert_eq!(m.position().state, PositionState::Closed);
        assert!(actions
            .iter()
            .any(|a| matches!(a, MachineAction::Emit(EngineEvent::Closed { .. }))));
        assert!(actions
            .iter()
            .any(|a| matches!(a, MachineAction::Deregister)));
        // Late tick for a closed position is dropped
        assert!(m.on_tick(&tick(21, 95.0)).is_empty());
    }

    #[test]
    fn test_close_retry_within_budget_succeeds() {
        // Rejected twice with budget 3: the third attempt closes
        let mut m = opened_machine(Side::Long, 3);
        m.on_tick(&tick(20, 96.0));

        m.on_close_result(OrderResult::Rejected {
            reason: "rate".to_string(),
        });
        assert_eq!(m.position().state, PositionState::Monitoring);

        let second = m.on_tick(&tick(21, 95.8));
        assert_eq!(close_intents(&second).len(), 1);
        m.on_close_result(OrderResult::Rejected {
            reason: "rate".to_string(),
        });
        assert_eq!(m.position().state, PositionState::Monitoring);

        let third = m.on_tick(&tick(22, 95.7));
        assert_eq!(close_intents(&third).len(), 1);
        let actions = m.on_close_result(OrderResult::Acknowledged {
            fill_price: dec!(95.7),
        });
        assert_eq!(m.position().state, PositionState::Closed);
        assert!(actions
            .iter()
            .any(|a| matches!(a, MachineAction::Deregister)));
    }

    #[test]
    fn test_close_budget_exhaustion_alerts_and_stays_exiting() {
        let mut m = opened_machine(Side::Long, 2);
        m.on_tick(&tick(20, 96.0));
        m.on_close_result(OrderResult::Rejected {
            reason: "margin".to_string(),
        });
        let second = m.on_tick(&tick(21, 95.8));
        assert_eq!(close_intents(&second).len(), 1);

        let actions = m.on_close_result(OrderResult::Rejected {
            reason: "margin".to_string(),
        });
        assert_eq!(m.position().state, PositionState::Exiting);
        assert!(actions
            .iter()
            .any(|a| matches!(a, MachineAction::Emit(EngineEvent::Alert { .. }))));
        // Never deregistered while the venue state is unknown
        assert!(!actions
            .iter()
            .any(|a| matches!(a, MachineAction::Deregister)));

        // Further ticks stay quiet; the alert fires once
        assert!(m.on_tick(&tick(22, 95.0)).is_empty());
    }

    #[test]
    fn test_close_attempt_keys_are_distinct() {
        let mut m = opened_machine(Side::Long, 3);
        let first = m.on_tick(&tick(20, 96.0));
        let key1 = close_intents(&first)[0].idempotency_key.clone();
        m.on_close_result(OrderResult::TimedOut);
        let second = m.on_tick(&tick(21, 95.8));
        let key2 = close_intents(&second)[0].idempotency_key.clone();
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_exiting_keeps_levels_current() {
        let mut m = opened_machine(Side::Long, 3);
        m.on_tick(&tick(20, 105.5)); // take-profit breach
        let stop_at_exit = m.position().current_stop.unwrap();
        // Price keeps running while the close is in flight
        m.on_tick(&tick(21, 107.0));
        assert!(m.position().current_stop.unwrap() >= stop_at_exit);
    }

    #[test]
    fn test_foreign_instrument_ticks_dropped() {
        let mut m = opened_machine(Side::Long, 3);
        let foreign = PriceTick {
            instrument: "ETH-USDT-SWAP".to_string(),
            timestamp: Utc::now(),
            high: dec!(1),
            low: dec!(0.5),
            close: dec!(0.7),
        };
        assert!(m.on_tick(&foreign).is_empty());
        assert_eq!(m.position().state, PositionState::Monitoring);
    }

    #[test]
    fn test_short_side_breach_direction() {
        let mut m = opened_machine(Side::Short, 3);
        // Stop for a short sits above entry; a rally breaches it
        let actions = m.on_tick(&tick(20, 103.5));
        assert_eq!(m.position().state, PositionState::Exiting);
        assert_eq!(close_intents(&actions).len(), 1);
    }
}
