//! Built-in recovery strategies.

mod local_repair;
mod protection;
mod restoration;
mod wdm;

pub use local_repair::{LocalRepairStrategy, LOCAL_REPAIR};
pub use protection::{ProtectionStrategy, PROTECTION};
pub use restoration::{RestorationStrategy, RESTORATION};
pub use wdm::{WdmRestorationStrategy, DEFAULT_MAX_REACH_KM, DEFAULT_WAVELENGTHS, WDM_RESTORATION};
