//! Domain services
pub mod pricing;

pub use pricing::{compute_breakdown, split_by_store, AppliedPromotion, PriceBreakdown, ShippingContext, ShippingRates};
