//! Resilience recovery engine.
//!
//! This crate turns failure and reparation events into route changes:
//!
//! - [`EventEffect`]: what an event does to the network (pure computation)
//! - [`CapacityLedger`]: free capacity with tentative-commit semantics
//! - [`RecoveryStrategy`]: pluggable recovery algorithms, selected through a
//!   [`StrategyRegistry`]
//! - [`SrgFailureModel`]: seeded SRG failure/reparation processes
//! - [`ResilienceEngine`]: the [`EventSink`](resilience_core::EventSink) tying
//!   it all together, with [`AvailabilityStats`] and a text report
//!
//! # Event flow
//!
//! ```text
//! TimedEvent<NetworkEvent>
//!        │
//!        ▼
//! EventEffect::compute(state, event)      ← pure, on the pre-event state
//!        │
//!        ▼
//! toggle node/link up state               ← the event is the topology change
//!        │
//!        ▼
//! RecoveryStrategy::process_event         ← credit / plan / debit / check
//!        │                                   on the strategy's own ledger
//!        ▼
//! apply ProvisioningActions in order
//!        │
//!        ▼
//! SrgFailureModel::follow_up → next event
//! ```

mod effect;
mod engine;
mod error;
mod failures;
mod ledger;
mod paths;
mod registry;
mod stats;
mod status;
mod strategies;
mod strategy;
mod wavelength;

pub use effect::{
    compute_failure_effect, compute_reparation_effect, expand_targets, is_demand_isolated,
    residual_capacity_excluding, EventEffect, FailureEffect, ReparationEffect,
};
pub use engine::{EngineConfig, ResilienceEngine};
pub use error::RecoveryError;
pub use failures::{srg_priority, SrgFailureModel};
pub use ledger::{
    attempt_reroute, attempt_with, Attempt, CapacityLedger, Checkpoint, Reservation,
    DEFAULT_TOLERANCE,
};
pub use paths::{
    constrained_shortest_path, fair_share_bottleneck, shortest_path, splice, widest_path,
    LinkCost,
};
pub use registry::{StrategyBuilder, StrategyRegistry};
pub use stats::AvailabilityStats;
pub use status::{RouteStatus, StatusCounts};
pub use strategies::{
    LocalRepairStrategy, ProtectionStrategy, RestorationStrategy, WdmRestorationStrategy,
    DEFAULT_MAX_REACH_KM, DEFAULT_WAVELENGTHS, LOCAL_REPAIR, PROTECTION, RESTORATION,
    WDM_RESTORATION,
};
pub use strategy::{
    end_to_end_candidate, is_on_primary, keep_or_preempt, needs_recovery, order_by_priority,
    recover_failure, release_affected, revert_candidate, RecoveryStrategy, StrategyCounters,
    StrategyParams,
};
pub use wavelength::{LightpathAssignment, TableCheckpoint, WavelengthTable, WAVELENGTHS_ATTRIBUTE};
