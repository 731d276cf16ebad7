//! Command-line interface for the `lmem` binary.

pub mod commands;
