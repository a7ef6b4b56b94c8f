//! Domain layer: pure values, aggregates and calculations. No I/O.

pub mod aggregates;
pub mod events;
pub mod services;
pub mod value_objects;
