// Domain models

mod host;
mod point;
mod sample;
mod window;

pub use host::HostInfo;
pub use point::{AccumulatedPoint, CPU_USAGE_MESSAGE_TYPE, CpuUsageMessage, Envelope};
pub use sample::{CPU_CATEGORIES, IDLE_INDEX, RawSample};
pub use window::WindowState;
