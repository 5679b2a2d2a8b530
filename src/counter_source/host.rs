// Host identity via sysinfo, gathered once at startup.

use super::linux;
use crate::models::HostInfo;
use sysinfo::System;

pub fn read_host_info() -> HostInfo {
    let mut sys = System::new();
    sys.refresh_cpu_all();
    let processor_name = linux::read_cpu_model_linux()
        .or_else(|| {
            sys.cpus()
                .first()
                .map(|c| c.brand().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| "Unknown".into());
    HostInfo {
        host_name: System::host_name().unwrap_or_default(),
        os_name: System::name().unwrap_or_else(|| std::env::consts::OS.into()),
        os_version: System::os_version().unwrap_or_default(),
        kernel_version: System::kernel_version().unwrap_or_default(),
        processor_name,
        logical_cores: sys.cpus().len() as u32,
    }
}
