//! Test suites for the service core.

mod lifecycle_behaviour;
mod support;
