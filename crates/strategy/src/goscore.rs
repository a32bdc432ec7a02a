//! GoScore: seven bounded signal components -> one confidence score and a
//! ternary sizing decision.
//!
//! Hard gates run before the continuous score. The breakdown is produced by
//! the same arithmetic path as the decision, so audit records are always
//! bit-consistent with what was decided.

use serde::{Deserialize, Serialize};

use zdte_core::{ConfigError, GoInputs, Regime, StructureType};

/// Signed component weights. Probability-of-touch and risk overage carry
/// negative weights by convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoWeights {
    pub poe: f64,
    pub pot: f64,
    pub edge: f64,
    pub liquidity: f64,
    pub regime_fit: f64,
    pub pin_risk: f64,
    pub rfib_overage: f64,
}

impl Default for GoWeights {
    fn default() -> Self {
        Self {
            poe: 1.6,
            pot: -1.1,
            edge: 0.8,
            liquidity: 0.6,
            regime_fit: 0.9,
            pin_risk: 0.4,
            rfib_overage: -1.8,
        }
    }
}

/// Strongly-typed scoring policy. An external loader may populate this from
/// configuration; the scorer only ever sees the struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoPolicy {
    pub weights: GoWeights,
    /// Added to the linear combination before the logistic map.
    pub bias: f64,
    /// Risk utilization where the overage term starts contributing.
    pub soft_rfib_start: f64,
    /// Risk utilization at or above which the trade is refused outright.
    pub hard_rfib_block: f64,
    /// Liquidity score below this is refused outright.
    pub liquidity_floor: f64,
    /// Score at or above this trades half size.
    pub half_threshold: f64,
    /// Score at or above this trades full size.
    pub full_threshold: f64,
}

impl Default for GoPolicy {
    fn default() -> Self {
        Self {
            weights: GoWeights::default(),
            bias: -1.5,
            soft_rfib_start: 0.8,
            hard_rfib_block: 1.0,
            liquidity_floor: 0.2,
            half_threshold: 55.0,
            full_threshold: 70.0,
        }
    }
}

impl GoPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.soft_rfib_start) {
            return Err(ConfigError::OutOfUnitRange { field: "go.soft_rfib_start" });
        }
        if self.hard_rfib_block <= self.soft_rfib_start {
            return Err(ConfigError::InvertedBounds { field: "go.hard_rfib_block" });
        }
        if !(0.0..=1.0).contains(&self.liquidity_floor) {
            return Err(ConfigError::OutOfUnitRange { field: "go.liquidity_floor" });
        }
        if self.half_threshold > self.full_threshold {
            return Err(ConfigError::InvertedBounds { field: "go.thresholds" });
        }
        Ok(())
    }
}

/// Sizing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoDecision {
    Full,
    Half,
    Skip,
}

impl std::fmt::Display for GoDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Half => write!(f, "half"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Which hard gate refused the trade, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HardGate {
    RiskBudget,
    CondorInConvexRegime,
    Illiquid,
}

/// One weighted component, for audit.
#[derive(Debug, Clone, Serialize)]
pub struct GoComponent {
    pub name: &'static str,
    pub input: f64,
    pub weighted: f64,
}

/// Full audit record of one scoring pass.
#[derive(Debug, Clone, Serialize)]
pub struct GoBreakdown {
    pub components: Vec<GoComponent>,
    pub z: f64,
    pub score: f64,
    pub hard_gate: Option<HardGate>,
    pub decision: GoDecision,
}

pub struct GoScorer {
    policy: GoPolicy,
}

impl GoScorer {
    #[must_use]
    pub fn new(policy: GoPolicy) -> Self {
        Self { policy }
    }

    /// Score a candidate and decide its sizing. The returned breakdown is
    /// the single source of truth: `decision` and `score` in it are what
    /// the orchestrator acts on.
    #[must_use]
    pub fn evaluate(
        &self,
        inputs: &GoInputs,
        regime: Regime,
        structure: StructureType,
    ) -> GoBreakdown {
        let p = &self.policy;
        let w = &p.weights;
        let x = inputs.clamped();

        let overage = if p.soft_rfib_start < 1.0 {
            ((x.rfib_util - p.soft_rfib_start) / (1.0 - p.soft_rfib_start)).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let components = vec![
            component("poe", x.poe, w.poe),
            component("pot", x.pot, w.pot),
            component("edge", x.edge, w.edge),
            component("liquidity", x.liquidity, w.liquidity),
            component("regime_fit", x.regime_fit, w.regime_fit),
            component("pin_risk", x.pin_risk, w.pin_risk),
            component("rfib_overage", overage, w.rfib_overage),
        ];
        let z = p.bias + components.iter().map(|c| c.weighted).sum::<f64>();
        let score = 100.0 / (1.0 + (-z).exp());

        let hard_gate = if x.rfib_util >= p.hard_rfib_block {
            Some(HardGate::RiskBudget)
        } else if regime == Regime::Convex && structure == StructureType::Condor {
            Some(HardGate::CondorInConvexRegime)
        } else if x.liquidity < p.liquidity_floor {
            Some(HardGate::Illiquid)
        } else {
            None
        };

        let decision = if hard_gate.is_some() {
            GoDecision::Skip
        } else if score >= p.full_threshold {
            GoDecision::Full
        } else if score >= p.half_threshold {
            GoDecision::Half
        } else {
            GoDecision::Skip
        };

        GoBreakdown {
            components,
            z,
            score,
            hard_gate,
            decision,
        }
    }
}

fn component(name: &'static str, input: f64, weight: f64) -> GoComponent {
    GoComponent {
        name,
        input,
        weighted: weight * input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn good_inputs() -> GoInputs {
        GoInputs {
            poe: 0.90,
            pot: 0.20,
            edge: 0.05,
            liquidity: 0.85,
            regime_fit: 0.75,
            pin_risk: 0.70,
            rfib_util: 0.10,
        }
    }

    fn scorer() -> GoScorer {
        GoScorer::new(GoPolicy::default())
    }

    #[test]
    fn strong_candidate_trades_full() {
        let b = scorer().evaluate(&good_inputs(), Regime::Calm, StructureType::Condor);
        assert!(b.hard_gate.is_none());
        assert_eq!(b.decision, GoDecision::Full, "score was {}", b.score);
    }

    #[test]
    fn weak_candidate_skips() {
        let inputs = GoInputs {
            poe: 0.55,
            pot: 0.85,
            edge: -0.30,
            liquidity: 0.40,
            regime_fit: 0.20,
            pin_risk: 0.20,
            rfib_util: 0.30,
        };
        let b = scorer().evaluate(&inputs, Regime::Calm, StructureType::SinglePut);
        assert_eq!(b.decision, GoDecision::Skip);
        assert!(b.hard_gate.is_none());
    }

    #[test]
    fn risk_budget_hard_block_wins_over_score() {
        let inputs = GoInputs {
            rfib_util: 1.0,
            ..good_inputs()
        };
        let b = scorer().evaluate(&inputs, Regime::Calm, StructureType::SinglePut);
        assert_eq!(b.hard_gate, Some(HardGate::RiskBudget));
        assert_eq!(b.decision, GoDecision::Skip);
    }

    #[test]
    fn condor_is_refused_in_convex_regime() {
        let b = scorer().evaluate(&good_inputs(), Regime::Convex, StructureType::Condor);
        assert_eq!(b.hard_gate, Some(HardGate::CondorInConvexRegime));
        // The same inputs on a single-side structure pass.
        let single = scorer().evaluate(&good_inputs(), Regime::Convex, StructureType::SinglePut);
        assert!(single.hard_gate.is_none());
    }

    #[test]
    fn liquidity_floor_gates() {
        let inputs = GoInputs {
            liquidity: 0.10,
            ..good_inputs()
        };
        let b = scorer().evaluate(&inputs, Regime::Calm, StructureType::SinglePut);
        assert_eq!(b.hard_gate, Some(HardGate::Illiquid));
    }

    #[test]
    fn threshold_comparison_is_inclusive() {
        // Pin the full threshold to the exact score the inputs produce: the
        // decision must read Full, not Half.
        let reference = scorer().evaluate(&good_inputs(), Regime::Calm, StructureType::SinglePut);
        let policy = GoPolicy {
            full_threshold: reference.score,
            half_threshold: reference.score,
            ..GoPolicy::default()
        };
        let b = GoScorer::new(policy).evaluate(&good_inputs(), Regime::Calm, StructureType::SinglePut);
        assert_relative_eq!(b.score, reference.score);
        assert_eq!(b.decision, GoDecision::Full);
    }

    #[test]
    fn breakdown_sums_to_z() {
        let b = scorer().evaluate(&good_inputs(), Regime::Calm, StructureType::SinglePut);
        let sum: f64 = b.components.iter().map(|c| c.weighted).sum();
        assert_relative_eq!(b.z, GoPolicy::default().bias + sum);
    }

    #[test]
    fn overage_only_counts_beyond_soft_start() {
        let below = scorer().evaluate(
            &GoInputs { rfib_util: 0.79, ..good_inputs() },
            Regime::Calm,
            StructureType::SinglePut,
        );
        let at = scorer().evaluate(
            &GoInputs { rfib_util: 0.80, ..good_inputs() },
            Regime::Calm,
            StructureType::SinglePut,
        );
        assert_relative_eq!(below.score, at.score);
        let above = scorer().evaluate(
            &GoInputs { rfib_util: 0.95, ..good_inputs() },
            Regime::Calm,
            StructureType::SinglePut,
        );
        assert!(above.score < at.score);
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let policy = GoPolicy {
            half_threshold: 80.0,
            full_threshold: 60.0,
            ..GoPolicy::default()
        };
        assert!(policy.validate().is_err());
    }
}
