//! Weighted combination of policy scores and the threshold decision

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::models::Recommendation;

// =============================================================================
// Weights
// =============================================================================

/// Relative importance of each policy. Validated on construction and on
/// deserialization, so a `Weights` value is always usable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights")]
pub struct Weights {
    reputation: f64,
    anomaly: f64,
    velocity: f64,
}

#[derive(Deserialize)]
struct RawWeights {
    reputation: f64,
    anomaly: f64,
    velocity: f64,
}

impl TryFrom<RawWeights> for Weights {
    type Error = CoreError;

    fn try_from(raw: RawWeights) -> CoreResult<Self> {
        Weights::new(raw.reputation, raw.anomaly, raw.velocity)
    }
}

impl Weights {
    pub fn new(reputation: f64, anomaly: f64, velocity: f64) -> CoreResult<Self> {
        for (name, w) in [
            ("reputation", reputation),
            ("anomaly", anomaly),
            ("velocity", velocity),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(CoreError::InvalidWeights(format!(
                    "{} weight must be a finite non-negative number, got {}",
                    name, w
                )));
            }
        }
        if reputation + anomaly + velocity <= 0.0 {
            return Err(CoreError::InvalidWeights(
                "weights must have a positive sum".to_string(),
            ));
        }
        Ok(Self {
            reputation,
            anomaly,
            velocity,
        })
    }

    pub fn reputation(&self) -> f64 {
        self.reputation
    }

    pub fn anomaly(&self) -> f64 {
        self.anomaly
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// `round(Σ sᵢwᵢ / Σ wᵢ)` clamped to 0-100.
    pub fn combine(&self, reputation: u8, anomaly: u8, velocity: u8) -> u8 {
        let weighted = f64::from(reputation) * self.reputation
            + f64::from(anomaly) * self.anomaly
            + f64::from(velocity) * self.velocity;
        let total = self.reputation + self.anomaly + self.velocity;
        (weighted / total).round().clamp(0.0, 100.0) as u8
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            reputation: 0.45,
            anomaly: 0.35,
            velocity: 0.20,
        }
    }
}

// =============================================================================
// Thresholds
// =============================================================================

/// Recommendation cut-offs; always strictly ascending `allow < hold < escalate < deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds")]
pub struct Thresholds {
    allow: u8,
    /// Only checked for ordering; the hold band starts at `allow`.
    hold: u8,
    escalate: u8,
    deny: u8,
}

#[derive(Deserialize)]
struct RawThresholds {
    allow: u8,
    hold: u8,
    escalate: u8,
    deny: u8,
}

impl TryFrom<RawThresholds> for Thresholds {
    type Error = CoreError;

    fn try_from(raw: RawThresholds) -> CoreResult<Self> {
        Thresholds::new(raw.allow, raw.hold, raw.escalate, raw.deny)
    }
}

impl Thresholds {
    pub fn new(allow: u8, hold: u8, escalate: u8, deny: u8) -> CoreResult<Self> {
        if !(allow < hold && hold < escalate && escalate < deny) {
            return Err(CoreError::InvalidThresholds(format!(
                "expected allow < hold < escalate < deny, got {}/{}/{}/{}",
                allow, hold, escalate, deny
            )));
        }
        if deny > 100 {
            return Err(CoreError::InvalidThresholds(format!(
                "deny threshold {} exceeds 100",
                deny
            )));
        }
        Ok(Self {
            allow,
            hold,
            escalate,
            deny,
        })
    }

    pub fn allow(&self) -> u8 {
        self.allow
    }

    pub fn hold(&self) -> u8 {
        self.hold
    }

    pub fn escalate(&self) -> u8 {
        self.escalate
    }

    pub fn deny(&self) -> u8 {
        self.deny
    }

    /// Map a combined score to a recommendation.
    ///
    /// Scores from `allow` up to `escalate` are held for review; below
    /// `allow` they pass.
    pub fn decide(&self, score: u8) -> Recommendation {
        if score >= self.deny {
            Recommendation::Deny
        } else if score >= self.escalate {
            Recommendation::Escalate
        } else if score >= self.allow {
            Recommendation::Hold
        } else {
            Recommendation::Allow
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            allow: 25,
            hold: 50,
            escalate: 70,
            deny: 85,
        }
    }
}
