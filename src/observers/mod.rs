mod observer;

#[cfg(feature = "logging")]
mod log;

pub use observer::{spawn_observer, Observer};

#[cfg(feature = "logging")]
pub use log::LogWriter;
