//! Integration tests: the public ranking API over every in-process strategy.

#[path = "../common/mod.rs"]
mod common;

mod postgres_tests;
mod ranking_tests;
mod scenario_tests;
