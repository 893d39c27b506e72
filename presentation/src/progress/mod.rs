//! Live run output

pub mod reporter;
