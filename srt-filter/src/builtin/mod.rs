//! Built-in filter variants

pub mod arq;
pub mod fec;
pub mod noop;

pub use arq::ArqFilter;
pub use fec::{FecFilter, FEC_HEADER_SIZE};
pub use noop::NoOpFilter;

/// Name of the ARQ level tunable shared by the variants that accept it
pub(crate) const ARQ_PARAM: &str = "arq";
