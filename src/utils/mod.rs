//! Utils module - logging setup and the durable error record

pub mod error_record;
pub mod logging;
