//! Engine orchestration
//!
//! Wires the registry, the per-position tasks, the execution coordinator and
//! the event bus together. Each position gets its own task consuming its own
//! mailbox, so one position's transitions are strictly sequential while all
//! positions evolve in parallel, and no venue call ever blocks tick
//! dispatch.

use crate::config::Config;
use crate::events::{EngineEvent, EventBus};
use crate::execution::{ExecutionCoordinator, IntentKind, VenueClient};
use crate::feed::PriceTick;
use crate::model::VolatilityBand;
use crate::policy::PolicyConfig;
use crate::position::{MachineAction, Position, PositionId, PositionMachine, Side};
use crate::registry::{PositionHandle, PositionMsg, PositionRegistry, RegistryError};
use crate::telemetry;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A request to open a position, produced by an upstream signal layer
#[derive(Debug, Clone)]
pub struct OpenRequest {
    /// Instrument symbol
    pub instrument: String,
    /// Direction
    pub side: Side,
    /// Entry target price
    pub target_price: Decimal,
    /// Size in contracts
    pub size: Decimal,
    /// Requested leverage; clamped to the instrument's volatility band
    pub leverage: u32,
    /// Latest ATR from the signal layer, used for the leverage clamp
    pub atr: Option<Decimal>,
}

/// The position and risk management engine
pub struct Engine {
    registry: Arc<PositionRegistry>,
    coordinator: Arc<ExecutionCoordinator>,
    events: EventBus,
    policy: PolicyConfig,
    atr_window: usize,
    retry_budget: u32,
}

impl Engine {
    /// Build an engine from configuration and a venue binding
    pub fn new(config: &Config, venue: Arc<dyn VenueClient>) -> Self {
        Self {
            registry: Arc::new(PositionRegistry::new(config.engine.max_open_positions)),
            coordinator: Arc::new(ExecutionCoordinator::new(
                venue,
                config.execution.retry.clone(),
            )),
            events: EventBus::default(),
            policy: config.policy.clone(),
            atr_window: config.engine.atr_window,
            retry_budget: config.engine.retry_budget,
        }
    }

    /// Lifecycle event bus
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The live-position registry
    pub fn registry(&self) -> &Arc<PositionRegistry> {
        &self.registry
    }

    /// Open a new position: register it, spawn its owning task, submit entry
    ///
    /// Refused (not queued) when the registry is at capacity.
    pub async fn open_position(&self, request: OpenRequest) -> Result<PositionId, EngineError> {
        let leverage = match request.atr {
            Some(atr) => {
                let band = VolatilityBand::classify(atr, request.target_price);
                let clamped = request.leverage.min(band.max_leverage());
                if clamped < request.leverage {
                    tracing::info!(
                        instrument = %request.instrument,
                        ?band,
                        requested = request.leverage,
                        clamped,
                        "Leverage clamped to volatility band"
                    );
                }
                clamped
            }
            None => request.leverage,
        };

        let position = Position::opening(
            request.instrument.clone(),
            request.side,
            request.target_price,
            request.size,
            leverage,
        );
        let id = position.id;

        let (tx, rx) = mpsc::unbounded_channel();
        self.registry
            .add(
                id,
                PositionHandle {
                    instrument: request.instrument.clone(),
                    tx: tx.clone(),
                },
            )
            .await?;

        let machine = PositionMachine::new(
            position,
            self.policy.clone(),
            self.atr_window,
            self.retry_budget,
        );
        tokio::spawn(position_task(
            machine,
            rx,
            tx,
            Arc::clone(&self.registry),
            Arc::clone(&self.coordinator),
            self.events.clone(),
        ));

        tracing::info!(
            position_id = %id,
            instrument = %request.instrument,
            side = %request.side,
            leverage,
            "Position opening"
        );
        Ok(id)
    }

    /// Drive the engine from a tick stream until the feed ends
    pub async fn run(&self, mut ticks: mpsc::Receiver<PriceTick>) {
        while let Some(tick) = ticks.recv().await {
            self.registry.dispatch(&tick).await;
        }
        tracing::info!("Tick feed ended");
    }
}

/// The task owning one position for its whole lifecycle
async fn position_task(
    mut machine: PositionMachine,
    mut rx: mpsc::UnboundedReceiver<PositionMsg>,
    self_tx: mpsc::UnboundedSender<PositionMsg>,
    registry: Arc<PositionRegistry>,
    coordinator: Arc<ExecutionCoordinator>,
    events: EventBus,
) {
    // Entry submission must not block the mailbox: the outcome comes back
    // as a message like everything else.
    {
        let intent = machine.entry_intent();
        let coordinator = Arc::clone(&coordinator);
        let tx = self_tx.clone();
        tokio::spawn(async move {
            let result = coordinator.submit(intent).await;
            let _ = tx.send(PositionMsg::EntryResult(result));
        });
    }

    while let Some(msg) = rx.recv().await {
        let actions = match msg {
            PositionMsg::Tick(tick) => {
                let actions = machine.on_tick(&tick);
                if let Some(atr) = machine.current_atr().and_then(|v| v.to_f64()) {
                    telemetry::gauge_volatility(&tick.instrument, atr);
                }
                actions
            }
            PositionMsg::EntryResult(result) => machine.on_entry_result(result),
            PositionMsg::CloseResult(result) => machine.on_close_result(result),
        };

        let mut deregister = false;
        for action in actions {
            match action {
                MachineAction::Submit(intent) => match intent.kind {
                    IntentKind::Close => {
                        let coordinator = Arc::clone(&coordinator);
                        let tx = self_tx.clone();
                        tokio::spawn(async move {
                            let result = coordinator.submit(intent).await;
                            let _ = tx.send(PositionMsg::CloseResult(result));
                        });
                    }
                    IntentKind::AdjustStop => {
                        // Best effort: a failed adjustment is superseded by
                        // the next tick's recomputation.
                        let coordinator = Arc::clone(&coordinator);
                        tokio::spawn(async move {
                            let result = coordinator.submit(intent.clone()).await;
                            if !matches!(
                                result,
                                crate::execution::OrderResult::Acknowledged { .. }
                            ) {
                                tracing::warn!(
                                    position_id = %intent.position_id,
                                    stop = %intent.trigger_price,
                                    ?result,
                                    "Stop adjustment not confirmed"
                                );
                            }
                        });
                    }
                    IntentKind::Open => {
                        let coordinator = Arc::clone(&coordinator);
                        let tx = self_tx.clone();
                        tokio::spawn(async move {
                            let result = coordinator.submit(intent).await;
                            let _ = tx.send(PositionMsg::EntryResult(result));
                        });
                    }
                },
                MachineAction::Emit(event) => {
                    match &event {
                        EngineEvent::StopAdjusted { .. } => telemetry::count_stop_adjustment(),
                        EngineEvent::Alert { .. } => telemetry::count_alert(),
                        _ => {}
                    }
                    events.publish(event);
                }
                MachineAction::Deregister => deregister = true,
            }
        }

        if deregister {
            coordinator.forget_position(machine.position().id).await;
            registry.remove(machine.position().id).await;
            break;
        }
    }
}
