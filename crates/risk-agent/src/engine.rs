//! Risk aggregation: run the policies, combine their scores, decide.

use futures::future::join_all;
use risk_core::{PolicyOutcome, RiskScore, ScoringRequest, Thresholds, Weights};
use std::time::Instant;
use tokio::task::JoinError;

use crate::config::AppConfig;
use crate::error::EngineError;
use crate::policies::{AmountPolicy, ReputationPolicy, VelocityPolicy};
use crate::provider::CachedChainData;

#[derive(Clone)]
pub struct RiskEngine {
    reputation: ReputationPolicy,
    amount: AmountPolicy,
    velocity: VelocityPolicy,
    weights: Weights,
    thresholds: Thresholds,
}

fn task_failed(policy: &'static str, e: JoinError) -> EngineError {
    EngineError::PolicyTask {
        policy,
        message: e.to_string(),
    }
}

impl RiskEngine {
    pub fn new(data: CachedChainData, config: &AppConfig) -> Self {
        Self {
            reputation: ReputationPolicy::new(data.clone(), config.policies.address.clone()),
            amount: AmountPolicy::new(data.clone(), config.policies.amount),
            velocity: VelocityPolicy::new(data),
            weights: config.scoring.weights,
            thresholds: config.scoring.thresholds,
        }
    }

    /// Score one request. The three policies run as separate tasks; only a
    /// task that dies (a panic) fails the whole call.
    pub async fn score(&self, request: &ScoringRequest) -> Result<RiskScore, EngineError> {
        let start = Instant::now();
        let from = request.from.clone();

        let reputation = {
            let policy = self.reputation.clone();
            let from = from.clone();
            tokio::spawn(async move { policy.evaluate(from.as_deref()).await })
        };
        let amount = {
            let policy = self.amount.clone();
            let amount = request.amount.clone();
            let from = from.clone();
            tokio::spawn(async move { policy.evaluate(amount.as_ref(), from.as_deref()).await })
        };
        let velocity = {
            let policy = self.velocity.clone();
            let context = request.context.clone();
            tokio::spawn(async move { policy.evaluate(context.as_ref(), from.as_deref()).await })
        };

        let (reputation, amount, velocity) = tokio::join!(reputation, amount, velocity);
        let reputation = reputation.map_err(|e| task_failed("reputation", e))?;
        let amount = amount.map_err(|e| task_failed("amount", e))?;
        let velocity = velocity.map_err(|e| task_failed("velocity", e))?;

        let result = self.decide(reputation, amount, velocity);
        tracing::info!(
            address = ?request.from,
            action = %request.action,
            reputation = %result.reasons[0],
            anomaly = %result.reasons[1],
            velocity = %result.reasons[2],
            score = %result.score,
            recommendation = %result.recommendation,
            duration_ms = %start.elapsed().as_millis(),
            "Risk analysis completed"
        );
        Ok(result)
    }

    /// Combine the three outcomes into the final score.
    pub fn decide(
        &self,
        reputation: PolicyOutcome,
        amount: PolicyOutcome,
        velocity: PolicyOutcome,
    ) -> RiskScore {
        tracing::debug!(
            reputation = %reputation.score,
            anomaly = %amount.score,
            velocity = %velocity.score,
            "Policy sub-scores"
        );
        let score = self
            .weights
            .combine(reputation.score, amount.score, velocity.score);

        RiskScore {
            score,
            reasons: vec![reputation.reason, amount.reason, velocity.reason],
            recommendation: self.thresholds.decide(score),
        }
    }

    /// Score every request on its own task. Results come back in input order.
    pub async fn score_batch(
        &self,
        requests: Vec<ScoringRequest>,
    ) -> Result<Vec<(ScoringRequest, RiskScore)>, EngineError> {
        let start = Instant::now();
        let count = requests.len();

        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let engine = self.clone();
                tokio::spawn(async move {
                    let result = engine.score(&request).await;
                    (request, result)
                })
            })
            .collect();

        let mut scored = Vec::with_capacity(count);
        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            let (request, result) = joined.map_err(|e| EngineError::BatchItem {
                index,
                message: e.to_string(),
            })?;
            let result = result.map_err(|e| EngineError::BatchItem {
                index,
                message: e.to_string(),
            })?;
            scored.push((request, result));
        }

        tracing::info!(
            count = %count,
            duration_ms = %start.elapsed().as_millis(),
            "Batch scored"
        );
        Ok(scored)
    }
}
