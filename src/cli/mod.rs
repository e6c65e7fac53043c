//! Command implementations for the `feather` binary.

pub mod commands;
