//! Infrastructure: storage backends, event publishers and clocks.
pub mod clock;
pub mod memory;
pub mod publisher;
pub mod postgres;

pub use clock::{FixedClock, SystemClock};
pub use memory::{InMemoryOrderRepository, InMemoryPromotionCatalog};
pub use publisher::{NatsPublisher, TracingPublisher};
pub use postgres::{PgOrderRepository, PgPromotionCatalog};
