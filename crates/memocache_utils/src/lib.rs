//! Small helpers shared across the memocache workspace: logging bootstrap and
//! the naming convention used to derive default cache locations.

pub mod logger;
pub mod naming;

pub use logger::init_logging;
pub use naming::snake_case;
