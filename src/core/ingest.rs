//! JSON-lines sample ingestion: validate, dedup, store, feed the power monitor.

use crate::config::Config;
use crate::core::power::process_sample;
use crate::db::pool::DbPool;
use crate::db::{devices, samples};
use crate::errors::{AppError, AppResult};
use crate::models::device::Device;
use crate::models::power::Transition;
use crate::models::sample::{RawSample, SampleInput};
use crate::utils::date::parse_timestamp;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub received: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub transitions: usize,
    pub events: usize,
    /// Devices whose batch could not be stored.
    pub errors: usize,
}

/// Parse a JSON-lines document. Blank lines are skipped; a malformed line is
/// reported as an invalid sample with its 1-based line number.
pub fn parse_jsonl(text: &str) -> (Vec<SampleInput>, Vec<AppError>) {
    let mut inputs = Vec::new();
    let mut bad = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<SampleInput>(line) {
            Ok(s) => inputs.push(s),
            Err(e) => bad.push(AppError::InvalidSample(format!("line {}: {e}", n + 1))),
        }
    }
    (inputs, bad)
}

/// Turn a wire record into a storable sample for `device`.
pub fn validate(device: &Device, input: &SampleInput) -> AppResult<RawSample> {
    let timestamp = parse_timestamp(&input.timestamp)
        .ok_or_else(|| AppError::InvalidSample(format!("unparsable timestamp '{}'", input.timestamp)))?;

    if input.counters.len() > 4 {
        return Err(AppError::InvalidSample(format!(
            "{} counters given, at most 4 allowed",
            input.counters.len()
        )));
    }
    if input.counters.len() < device.selected_counter as usize {
        return Err(AppError::InvalidSample(format!(
            "counter {} missing ({} given)",
            device.selected_counter,
            input.counters.len()
        )));
    }
    if let Some(c) = input.counters.iter().find(|c| **c < 0) {
        return Err(AppError::InvalidSample(format!("negative counter value {c}")));
    }
    if input.analog.len() > 4 || input.digital.len() > 4 {
        return Err(AppError::InvalidSample("more than 4 channels given".to_string()));
    }
    if let Some(v) = input.analog.iter().flatten().find(|v| !v.is_finite()) {
        return Err(AppError::InvalidSample(format!("non-finite analog value {v}")));
    }

    let mut counters = [0i64; 4];
    counters[..input.counters.len()].copy_from_slice(&input.counters);
    let mut analog = [None; 4];
    analog[..input.analog.len()].copy_from_slice(&input.analog);
    let mut digital = [None; 4];
    digital[..input.digital.len()].copy_from_slice(&input.digital);

    Ok(RawSample {
        id: 0,
        device_id: device.id,
        timestamp,
        counters,
        analog,
        digital,
    })
}

pub struct IngestLogic;

impl IngestLogic {
    /// Store `inputs`, grouped per device and in timestamp order.
    ///
    /// Invalid records are skipped and logged without touching the database.
    /// With `process_power`, each newly stored sample goes through the power
    /// state machine inside the same device transaction.
    pub fn ingest(
        pool: &mut DbPool,
        inputs: &[SampleInput],
        cfg: &Config,
        process_power: bool,
    ) -> AppResult<IngestReport> {
        let mut report = IngestReport {
            received: inputs.len(),
            ..Default::default()
        };

        let mut known: BTreeMap<String, Device> = BTreeMap::new();
        let mut grouped: BTreeMap<i64, (Device, Vec<RawSample>)> = BTreeMap::new();

        for input in inputs {
            let device = match known.get(&input.device) {
                Some(d) => d.clone(),
                None => match devices::find_device(&pool.conn, &input.device) {
                    Ok(d) => {
                        known.insert(input.device.clone(), d.clone());
                        d
                    }
                    Err(e @ AppError::UnknownDevice(_)) => {
                        tracing::warn!(device = %input.device, timestamp = %input.timestamp, error = %e, "sample skipped");
                        report.invalid += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                },
            };

            match validate(&device, input) {
                Ok(sample) => grouped
                    .entry(device.id)
                    .or_insert_with(|| (device.clone(), Vec::new()))
                    .1
                    .push(sample),
                Err(e) => {
                    tracing::warn!(device = %input.device, timestamp = %input.timestamp, error = %e, "sample skipped");
                    report.invalid += 1;
                }
            }
        }

        for (device_id, (device, mut batch)) in grouped {
            batch.sort_by_key(|s| s.timestamp);
            let result = pool.with_device_tx(device_id, false, |tx| {
                let (mut inserted, mut duplicates, mut transitions, mut events) = (0, 0, 0, 0);
                for sample in &batch {
                    if !samples::insert_sample(tx, sample)? {
                        duplicates += 1;
                        continue;
                    }
                    inserted += 1;
                    if process_power {
                        let out = process_sample(tx, &device, sample, cfg)?;
                        if out.transition != Transition::None {
                            transitions += 1;
                        }
                        events += out.events.len();
                    }
                }
                Ok((inserted, duplicates, transitions, events))
            });

            match result {
                Ok((inserted, duplicates, transitions, events)) => {
                    report.inserted += inserted;
                    report.duplicates += duplicates;
                    report.transitions += transitions;
                    report.events += events;
                    tracing::debug!(device_id, inserted, duplicates, "samples stored");
                }
                Err(e) => {
                    tracing::error!(device_id, error = %e, "ingest failed for device");
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            received = report.received,
            inserted = report.inserted,
            duplicates = report.duplicates,
            invalid = report.invalid,
            "ingest finished"
        );
        Ok(report)
    }
}
