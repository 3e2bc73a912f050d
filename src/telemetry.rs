use nvml_wrapper::Nvml;
use nvml_wrapper::enums::device::UsedGpuMemory;
use nvml_wrapper::struct_wrappers::device::ProcessInfo;
use sysinfo::{Pid, System};
use tracing::{debug, warn};

use crate::{BenchError, GpuReading, TelemetrySource};

/// Handle on the benchmark's own OS process, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pid: Pid,
}

impl ProcessHandle {
    pub fn current() -> Result<Self, BenchError> {
        let pid = sysinfo::get_current_pid()
            .map_err(|err| BenchError::Telemetry(format!("cannot resolve own pid: {err}")))?;
        Ok(Self { pid })
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[must_use]
    pub fn raw_pid(&self) -> u32 {
        self.pid.as_u32()
    }
}

/// Host CPU utilization and the resident memory of one process.
pub struct HostProbe {
    system: System,
    process: ProcessHandle,
}

impl HostProbe {
    pub fn new(process: &ProcessHandle) -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_process(process.pid());
        Self {
            system,
            process: *process,
        }
    }

    pub fn cpu_percent(&mut self) -> f64 {
        self.system.refresh_cpu();
        f64::from(self.system.global_cpu_info().cpu_usage())
    }

    pub fn resident_memory_bytes(&mut self) -> Result<u64, BenchError> {
        if !self.system.refresh_process(self.process.pid()) {
            return Err(BenchError::Telemetry(format!(
                "process {} is no longer visible",
                self.process.pid()
            )));
        }
        self.system
            .process(self.process.pid())
            .map(|p| p.memory())
            .ok_or_else(|| {
                BenchError::Telemetry(format!("process {} has no entry", self.process.pid()))
            })
    }
}

pub trait GpuProbe {
    fn read(&mut self) -> Result<GpuReading, BenchError>;
}

/// Reads utilization and per-process memory of one NVIDIA device through NVML.
pub struct NvmlGpuProbe {
    nvml: Nvml,
    device_index: u32,
    pid: u32,
}

impl NvmlGpuProbe {
    pub fn new(device_index: u32, process: &ProcessHandle) -> Result<Self, BenchError> {
        let nvml = Nvml::init()
            .map_err(|err| BenchError::Unsupported(format!("NVML unavailable: {err}")))?;
        nvml.device_by_index(device_index).map_err(|err| {
            BenchError::Unsupported(format!("GPU {device_index} not available: {err}"))
        })?;
        Ok(Self {
            nvml,
            device_index,
            pid: process.raw_pid(),
        })
    }
}

impl GpuProbe for NvmlGpuProbe {
    fn read(&mut self) -> Result<GpuReading, BenchError> {
        let device = self
            .nvml
            .device_by_index(self.device_index)
            .map_err(|err| BenchError::Telemetry(format!("nvml device: {err}")))?;
        let utilization = device
            .utilization_rates()
            .map_err(|err| BenchError::Telemetry(format!("nvml utilization: {err}")))?;

        let mut processes = device
            .running_compute_processes()
            .map_err(|err| BenchError::Telemetry(format!("nvml compute processes: {err}")))?;
        processes.extend(
            device
                .running_graphics_processes()
                .map_err(|err| BenchError::Telemetry(format!("nvml graphics processes: {err}")))?,
        );

        Ok(GpuReading {
            utilization_percent: f64::from(utilization.gpu),
            process_memory_bytes: process_memory(&processes, self.pid),
        })
    }
}

/// Memory attributed to `pid`; `None` when the pid is not listed.
fn process_memory(processes: &[ProcessInfo], pid: u32) -> Option<u64> {
    let mut matched = processes.iter().filter(|p| p.pid == pid).peekable();
    matched.peek()?;
    Some(
        matched
            .map(|p| match p.used_gpu_memory {
                UsedGpuMemory::Used(bytes) => bytes,
                UsedGpuMemory::Unavailable => 0,
            })
            .sum(),
    )
}

/// Stand-in when no NVIDIA device can be queried.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGpuProbe;

impl GpuProbe for NoGpuProbe {
    fn read(&mut self) -> Result<GpuReading, BenchError> {
        Ok(GpuReading::default())
    }
}

/// Production telemetry: sysinfo for the host, NVML (when present) for the GPU.
pub struct SystemTelemetry {
    host: HostProbe,
    gpu: Box<dyn GpuProbe>,
}

impl SystemTelemetry {
    pub fn new(host: HostProbe, gpu: Box<dyn GpuProbe>) -> Self {
        Self { host, gpu }
    }

    /// Falls back to [`NoGpuProbe`] with a warning if NVML cannot be used.
    pub fn detect(process: &ProcessHandle, gpu_index: u32) -> Self {
        let gpu: Box<dyn GpuProbe> = match NvmlGpuProbe::new(gpu_index, process) {
            Ok(probe) => {
                debug!(gpu_index, "using NVML GPU telemetry");
                Box::new(probe)
            }
            Err(err) => {
                warn!(error = %err, "GPU telemetry disabled, GPU metrics will read 0");
                Box::new(NoGpuProbe)
            }
        };
        Self::new(HostProbe::new(process), gpu)
    }
}

impl TelemetrySource for SystemTelemetry {
    fn gpu(&mut self) -> Result<GpuReading, BenchError> {
        self.gpu.read()
    }

    fn cpu_percent(&mut self) -> Result<f64, BenchError> {
        Ok(self.host.cpu_percent())
    }

    fn resident_memory_bytes(&mut self) -> Result<u64, BenchError> {
        self.host.resident_memory_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(pid: u32, used: UsedGpuMemory) -> ProcessInfo {
        ProcessInfo {
            pid,
            used_gpu_memory: used,
            gpu_instance_id: None,
            compute_instance_id: None,
        }
    }

    #[test]
    fn process_memory_sums_matching_entries() {
        let processes = [
            info(10, UsedGpuMemory::Used(1_000)),
            info(42, UsedGpuMemory::Used(2_000_000)),
            info(42, UsedGpuMemory::Used(500_000)),
        ];
        assert_eq!(process_memory(&processes, 42), Some(2_500_000));
    }

    #[test]
    fn process_memory_is_none_without_a_match() {
        let processes = [info(10, UsedGpuMemory::Used(1_000))];
        assert_eq!(process_memory(&processes, 42), None);
        assert_eq!(process_memory(&[], 42), None);
    }

    #[test]
    fn unavailable_memory_counts_as_zero() {
        let processes = [info(42, UsedGpuMemory::Unavailable)];
        assert_eq!(process_memory(&processes, 42), Some(0));
    }

    #[test]
    fn no_gpu_probe_reports_zero() {
        let reading = NoGpuProbe.read().unwrap();
        assert_eq!(reading.utilization_percent, 0.0);
        assert_eq!(reading.process_memory_bytes, None);
    }

    #[test]
    fn host_probe_sees_own_process() {
        let handle = ProcessHandle::current().unwrap();
        assert_eq!(handle.raw_pid(), std::process::id());

        let mut host = HostProbe::new(&handle);
        assert!(host.resident_memory_bytes().unwrap() > 0);
        let cpu = host.cpu_percent();
        assert!(cpu >= 0.0);
    }
}
