//! Gauge selection.
//!
//! Scores candidate gauges by effective yield (reward APR discounted by
//! a liquidity-depth factor), discards anything below the minimum
//! liquidity threshold, and picks at most one gauge per cycle. This is
//! a pure function of (candidates, config): no side effects and no
//! randomness, so cycle outcomes stay auditable and repeatable.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::SelectionConfig;
use crate::types::{GaugeRecord, TradeDecision};

/// A candidate that cleared the threshold, with its computed score.
#[derive(Debug, Clone)]
struct Scored {
    gauge: GaugeRecord,
    score: Decimal,
}

/// Effective-yield score: APR × depth factor. The depth factor
/// `liquidity / (liquidity + half_life)` penalises thin pools and
/// approaches 1 as depth grows, so a deep 9% pool can beat a shallow
/// 15% one.
fn effective_score(gauge: &GaugeRecord, half_life_usd: Decimal) -> Decimal {
    let denominator = gauge.liquidity_usd + half_life_usd;
    if denominator <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    gauge.reward_apr * (gauge.liquidity_usd / denominator)
}

/// Select the best gauge, or `None` when no candidate clears the
/// minimum-liquidity threshold (the cycle then Skips: no signer,
/// publisher, or execution work is performed).
pub fn select_gauge(candidates: &[GaugeRecord], config: &SelectionConfig) -> Option<TradeDecision> {
    let mut scored: Vec<Scored> = candidates
        .iter()
        .filter(|g| {
            let eligible = g.liquidity_usd >= config.min_liquidity_usd;
            if !eligible {
                debug!(
                    gauge = %g.address,
                    liquidity = %g.liquidity_usd,
                    threshold = %config.min_liquidity_usd,
                    "Gauge below liquidity threshold"
                );
            }
            eligible
        })
        .map(|g| Scored {
            gauge: g.clone(),
            score: effective_score(g, config.depth_half_life_usd),
        })
        .collect();

    if scored.is_empty() {
        info!(candidates = candidates.len(), "No gauge cleared the liquidity threshold");
        return None;
    }

    // Rank descending by score; ties break by lower estimated slippage,
    // then by address so the ordering is total.
    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.gauge.est_slippage.cmp(&b.gauge.est_slippage))
            .then(a.gauge.address.cmp(&b.gauge.address))
    });

    let winner = scored.remove(0);
    info!(
        gauge = %winner.gauge.address,
        chain = %winner.gauge.chain,
        apr = %winner.gauge.reward_apr,
        score = %winner.score,
        ranked = scored.len() + 1,
        "Gauge selected"
    );

    Some(decision_for(winner))
}

fn decision_for(scored: Scored) -> TradeDecision {
    let rationale = format!(
        "top effective yield {:.4} (apr {:.4}, depth ${:.0}) among eligible gauges",
        scored.score, scored.gauge.reward_apr, scored.gauge.liquidity_usd,
    );
    TradeDecision {
        amount_usd: Decimal::ZERO, // sized by the caller via `size_position`
        deposit_token: String::new(),
        score: scored.score,
        rationale,
        gauge: scored.gauge,
    }
}

/// Position size: the configured deposit, capped at a fraction of the
/// pool's liquidity so one cycle can't dominate a thin pool.
pub fn size_position(
    gauge: &GaugeRecord,
    deposit_amount_usd: Decimal,
    max_pool_share: Decimal,
) -> Decimal {
    let cap = gauge.liquidity_usd * max_pool_share;
    deposit_amount_usd.min(cap)
}

/// Deterministic gauge selector binding a `SelectionConfig` with the
/// cycle's sizing inputs.
pub struct GaugeSelector {
    config: SelectionConfig,
    deposit_token: String,
    deposit_amount_usd: Decimal,
}

impl GaugeSelector {
    pub fn new(config: SelectionConfig, deposit_token: String, deposit_amount_usd: Decimal) -> Self {
        Self {
            config,
            deposit_token,
            deposit_amount_usd,
        }
    }

    /// Score, rank, and size — at most one gauge per cycle.
    pub fn select(&self, candidates: &[GaugeRecord]) -> Option<TradeDecision> {
        let mut decision = select_gauge(candidates, &self.config)?;
        decision.amount_usd = size_position(
            &decision.gauge,
            self.deposit_amount_usd,
            self.config.max_pool_share,
        );
        decision.deposit_token = self.deposit_token.clone();
        Some(decision)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
