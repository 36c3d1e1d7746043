pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod eml;
pub mod endpoints;
pub mod error;
pub mod fetch;
pub mod harvest;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod summary;
pub mod sync;
pub mod xml;

pub use error::{PastaError, PastaResult};
