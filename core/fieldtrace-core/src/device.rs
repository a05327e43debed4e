//! Device metadata collection.
//!
//! Populates the `mobile_*` columns of a fix. Values that the platform does
//! not expose stay `None` and go out as explicit nulls.

use sysinfo::System;

use fieldtrace_protocol::DeviceInfo;

/// Collects device metadata from the running system.
pub fn collect() -> DeviceInfo {
    DeviceInfo {
        brand: non_empty(System::distribution_id()),
        model: System::host_name(),
        os_name: System::name(),
        os_version: System::os_version(),
        build_id: System::kernel_version(),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
