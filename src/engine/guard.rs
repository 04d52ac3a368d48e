//! Live execution guard.
//!
//! The single authority deciding whether a cycle may move real funds.
//! Pure function of five booleans, evaluated fresh every cycle. The
//! result is never cached: yesterday's approval says nothing about
//! today's chain state.

use tracing::{info, warn};

/// Preconditions for live execution, gathered by the orchestrator at
/// the guard stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardInputs {
    /// Config requested live trading.
    pub live_mode: bool,
    /// Operator passed the explicit out-of-config authorization flag.
    pub live_authorized: bool,
    /// Publisher probe for the selected chain succeeded this cycle.
    pub probe_ok: bool,
    /// Preflight simulation passed this cycle.
    pub preflight_ok: bool,
    /// Provisioned signer can actually sign.
    pub can_sign: bool,
}

/// Guard verdict for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Every precondition held; broadcast is permitted.
    Execute,
    /// At least one precondition failed; the cycle records the
    /// paper-trade outcome and stops short of broadcast.
    DryRunOnly,
}

impl GuardDecision {
    pub fn permits_broadcast(&self) -> bool {
        matches!(self, GuardDecision::Execute)
    }
}

/// Evaluate the guard. Execute requires ALL of: live mode configured,
/// explicit operator authorization, a healthy probe, a passing
/// preflight, and a signing-capable signer. Anything less is dry-run.
pub fn evaluate(inputs: GuardInputs) -> GuardDecision {
    let GuardInputs {
        live_mode,
        live_authorized,
        probe_ok,
        preflight_ok,
        can_sign,
    } = inputs;

    if live_mode && live_authorized && probe_ok && preflight_ok && can_sign {
        info!("Live guard passed: execution permitted");
        return GuardDecision::Execute;
    }

    if live_mode && !live_authorized {
        warn!("Live mode configured but not authorized; staying in dry-run");
    }
    info!(
        live_mode,
        live_authorized, probe_ok, preflight_ok, can_sign, "Live guard: dry-run only"
    );
    GuardDecision::DryRunOnly
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
