//! Application layer: the order lifecycle service and the seams it depends on.
pub mod ports;
pub mod service;

pub use ports::{Clock, EventPublisher, OrderFilter, OrderRecord, OrderRepository, PromotionCatalog, RepositoryError};
pub use service::{CheckoutRequest, OrderLifecycleService};
