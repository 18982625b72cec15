//! Test suites for the conductor supervisor.

mod behaviour;
pub(crate) mod support;
