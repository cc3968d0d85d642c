// src/device/discover.rs

//! Device table detection through `nvidia-smi`.
//!
//! Used when the settings file has no `[[device]]` entries. A missing or
//! failing `nvidia-smi` simply yields an empty table, which leaves only
//! device-free tasks schedulable.

use anyhow::{Context, Result, anyhow};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::device::DeviceInfo;

const NVIDIA_SMI: &str = "nvidia-smi";
const QUERY_ARGS: [&str; 2] = ["--query-gpu=index,memory.total", "--format=csv,noheader,nounits"];

/// Ask `nvidia-smi` for the installed GPUs and their total memory.
pub async fn detect_devices() -> Vec<DeviceInfo> {
    let output = match Command::new(NVIDIA_SMI)
        .args(QUERY_ARGS)
        .kill_on_drop(true)
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            debug!(error = %e, "{NVIDIA_SMI} not available; no devices detected");
            return Vec::new();
        }
    };

    if !output.status.success() {
        warn!(
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "{NVIDIA_SMI} failed; no devices detected"
        );
        return Vec::new();
    }

    match parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout)) {
        Ok(devices) => {
            info!(count = devices.len(), "detected devices");
            devices
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "unexpected {NVIDIA_SMI} output; no devices detected");
            Vec::new()
        }
    }
}

/// Parse `index, memory.total` CSV rows (memory in MiB, no header or units).
pub fn parse_nvidia_smi(output: &str) -> Result<Vec<DeviceInfo>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (id, memory) = line
                .split_once(',')
                .ok_or_else(|| anyhow!("expected `index, memory` in {line:?}"))?;
            Ok(DeviceInfo {
                id: id
                    .trim()
                    .parse()
                    .with_context(|| format!("device index in {line:?}"))?,
                memory: memory
                    .trim()
                    .parse()
                    .with_context(|| format!("device memory in {line:?}"))?,
            })
        })
        .collect()
}
