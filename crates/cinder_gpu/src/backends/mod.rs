//! Provider implementations

pub mod software;
