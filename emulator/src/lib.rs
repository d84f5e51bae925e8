pub mod config;
pub mod io;
pub mod scheduler;
pub mod snapshot;
pub mod soc;

pub use config::{ConfigError, SocConfig};
pub use io::MMIOHandler;
pub use scheduler::{Scheduler, VirtualClock};
pub use soc::Soc;
