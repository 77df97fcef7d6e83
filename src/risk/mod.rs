//! Risk assessment: factor configuration, weighted scoring, intervention
//! policy, and offline weight adaptation.

pub mod factors;
pub mod policy;
pub mod scorer;
pub mod weights;

pub use factors::{BehaviorFactor, BehaviorSample, FactorConfig, FactorTable};
pub use policy::{
    Action, ActionType, InterventionDecision, InterventionPolicy, InterventionResponse,
    InterventionType, RiskLevel, Urgency, WarningLevel,
};
pub use scorer::{RiskAssessment, RiskDetail, RiskScorer};
pub use weights::WeightUpdater;
