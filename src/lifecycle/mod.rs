//! Process lifecycle helpers

mod shutdown;
mod supervise;

pub use shutdown::ShutdownSignal;
pub use supervise::supervise;
