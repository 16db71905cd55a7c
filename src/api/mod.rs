pub mod rest;

pub use rest::{RestApi, DEGRADED_HEADER};
