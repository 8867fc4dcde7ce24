//! Infrastructure layer: event store, command pipeline, projections, services.

pub mod command_dispatcher;
pub mod event_store;
pub mod locks;
pub mod projections;
pub mod read_model;
pub mod services;
