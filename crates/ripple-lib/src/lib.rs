pub mod config;
pub mod detectors;
pub mod emg;
pub mod error;
pub mod events;
pub mod filter;
pub mod io;
pub mod metrics;
pub mod plot;
pub mod signal;
pub mod source;

pub use config::RippleConfig;
pub use detectors::*;
pub use error::{Result, RippleError};
pub use events::*;
pub use metrics::*;
pub use signal::*;
