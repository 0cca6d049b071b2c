//! CLI commands

pub mod apply;
pub mod backup;
pub mod restore;
