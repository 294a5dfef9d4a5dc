//! Service layer: external collaborators and the observation pipeline

pub mod geo;
pub mod ledger;
pub mod metrics;
pub mod pipeline;
pub mod probe;
