//! Route monitoring: the per-cycle pipeline and the per-route task registry.

mod cycle;
mod registry;

pub(crate) use cycle::persist_transition;
pub use cycle::{CycleError, CycleOutcome, CycleReport, CycleRunner, MonitorExit};
pub use registry::RouteMonitorRegistry;
