//! Test fixtures for extractor integration tests

#![allow(dead_code)]

pub mod invokers;
pub mod records;

pub use invokers::*;
pub use records::*;
