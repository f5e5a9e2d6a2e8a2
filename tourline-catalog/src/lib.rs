pub mod tour;
pub mod policy;
pub mod instance;
pub mod ledger;
pub mod risk;
pub mod pricing;
pub mod lifecycle;

pub use tour::{GroupSize, Tour, TourError};
pub use policy::{CancellationPolicy, CancellationRule, PolicyError};
pub use instance::{BonusIncentive, DiscountReason, DynamicPricing, InstanceStatus, TourInstance};
pub use ledger::{CapacityLedger, LedgerError};
pub use risk::RiskConfig;
pub use pricing::{DiscountDecision, DynamicPricingEngine, PricingConfig};
pub use lifecycle::{InstanceLifecycle, LifecycleError, Recompute, ScheduleRequest};
