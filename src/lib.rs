// Library for tests to access modules

pub mod accumulator;
pub mod config;
pub mod counter_source;
pub mod coverage;
pub mod models;
pub mod orchestrator;
pub mod routes;
pub mod sample_store;
pub mod transport;
pub mod utilization;
pub mod worker;
