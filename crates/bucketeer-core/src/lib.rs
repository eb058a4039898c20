//! Core types, configuration, and catalog handling for Bucketeer.
//!
//! This crate provides the foundational building blocks shared across the
//! Bucketeer service broker, including broker configuration, the service
//! catalog with its per-plan resource templates, and resource tag
//! generation.

mod catalog;
mod config;
mod error;
mod tags;

pub use catalog::{Catalog, PlanProperties, Service, ServicePlan};
pub use config::{BrokerConfig, default_endpoint};
pub use error::{CoreError, CoreResult};
pub use tags::{Action, BrokerTagGenerator, CorrelationIds, TagGenerator};
