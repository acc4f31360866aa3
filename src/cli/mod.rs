//! CLI support for the edd-export binary

pub mod commands;
pub mod error;
