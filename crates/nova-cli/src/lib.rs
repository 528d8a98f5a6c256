//! Library wrapper around the `nova` CLI implementation.
//!
//! The binary (`src/main.rs`) is compiled as a module here so that
//! `cargo test -p nova-cli --lib` typechecks the CLI without building the
//! integration test suite.

#[allow(dead_code)]
#[path = "main.rs"]
mod main_bin;
