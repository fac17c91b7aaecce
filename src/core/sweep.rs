//! Fleet-wide sweeps: one device failing never aborts the others.

use crate::errors::AppResult;
use crate::models::device::Device;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOutcome {
    Updated,
    Unchanged,
    NoData,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub processed: usize,
    pub updated: usize,
    pub no_data: usize,
    pub errors: usize,
    /// `(device id, error message)` for every failed device.
    pub failures: Vec<(i64, String)>,
}

impl SweepReport {
    pub fn record(&mut self, device_id: i64, outcome: AppResult<DeviceOutcome>) {
        self.processed += 1;
        match outcome {
            Ok(DeviceOutcome::Updated) => self.updated += 1,
            Ok(DeviceOutcome::Unchanged) => {}
            Ok(DeviceOutcome::NoData) => self.no_data += 1,
            Err(e) => {
                tracing::error!(device_id, error = %e, "device failed during sweep");
                self.errors += 1;
                self.failures.push((device_id, e.to_string()));
            }
        }
    }
}

/// Run `job` for every device, isolating failures.
pub fn sweep_devices<F>(label: &str, devices: &[Device], mut job: F) -> SweepReport
where
    F: FnMut(&Device) -> AppResult<DeviceOutcome>,
{
    let mut report = SweepReport::default();
    for device in devices {
        let outcome = job(device);
        report.record(device.id, outcome);
    }
    tracing::info!(
        sweep = label,
        processed = report.processed,
        updated = report.updated,
        no_data = report.no_data,
        errors = report.errors,
        "sweep finished"
    );
    report
}
