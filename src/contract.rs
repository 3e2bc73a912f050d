use std::path::Path;
use std::{fmt, fmt::Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    H264,
    Hevc,
}

impl Codec {
    /// Guesses the codec of an Annex-B elementary stream from its extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("h265" | "hevc" | "265") => Self::Hevc,
            _ => Self::H264,
        }
    }
}

impl Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => f.write_str("h264"),
            Self::Hevc => f.write_str("hevc"),
        }
    }
}

/// One of the interchangeable frame-production backends under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderVariant {
    Hardware,
    Software,
    Capture,
}

impl DecoderVariant {
    pub const ALL: [DecoderVariant; 3] = [Self::Hardware, Self::Software, Self::Capture];

    /// File stem used for every per-variant output file.
    #[must_use]
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Hardware => "nvdec",
            Self::Software => "openh264",
            Self::Capture => "opencv",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Hardware => "NVDEC",
            Self::Software => "OpenH264",
            Self::Capture => "OpenCV",
        }
    }

    #[must_use]
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.file_stem() == stem)
    }
}

impl Display for DecoderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// Parses a command-line decoder selector into the ordered list of variants.
pub fn parse_selector(raw: &str) -> Result<Vec<DecoderVariant>, BenchError> {
    match raw.to_ascii_lowercase().as_str() {
        "all" => Ok(DecoderVariant::ALL.to_vec()),
        "nvdec" | "nv" | "hw" => Ok(vec![DecoderVariant::Hardware]),
        "openh264" | "h264" | "sw" => Ok(vec![DecoderVariant::Software]),
        "opencv" | "cv" => Ok(vec![DecoderVariant::Capture]),
        other => Err(BenchError::InvalidInput(format!(
            "unknown decoder selector: {other}"
        ))),
    }
}

pub(crate) const METRIC_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    FrameProcessingTime,
    CpuUtilization,
    MemoryUtilization,
    GpuUtilization,
    GpuMemoryUtilization,
}

impl Metric {
    pub const ALL: [Metric; METRIC_COUNT] = [
        Self::FrameProcessingTime,
        Self::CpuUtilization,
        Self::MemoryUtilization,
        Self::GpuUtilization,
        Self::GpuMemoryUtilization,
    ];

    /// Directory name under `csv/` and `plot/`.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::FrameProcessingTime => "fpt",
            Self::CpuUtilization => "cpu",
            Self::MemoryUtilization => "mem",
            Self::GpuUtilization => "gpu",
            Self::GpuMemoryUtilization => "gpu_mem",
        }
    }

    /// Table heading, including the unit.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::FrameProcessingTime => "Frame Processing Time (ms)",
            Self::CpuUtilization => "CPU Utilization Across All Cores (%)",
            Self::MemoryUtilization => "Memory Utilization (MB)",
            Self::GpuUtilization => "GPU Utilization (%)",
            Self::GpuMemoryUtilization => "GPU Memory Utilization (MB)",
        }
    }

    #[must_use]
    pub fn plot_heading(self) -> &'static str {
        match self {
            Self::FrameProcessingTime => "Frame Processing Time",
            Self::CpuUtilization => "CPU Utilization",
            Self::MemoryUtilization => "Memory Utilization",
            Self::GpuUtilization => "GPU Utilization",
            Self::GpuMemoryUtilization => "GPU Memory Utilization",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::FrameProcessingTime => 0,
            Self::CpuUtilization => 1,
            Self::MemoryUtilization => 2,
            Self::GpuUtilization => 3,
            Self::GpuMemoryUtilization => 4,
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Result of decoding one unit (packet, access unit, or capture read).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStep {
    /// A unit was consumed; `frames` pictures came out of it (0 while the decoder buffers).
    Decoded { frames: usize },
    EndOfStream,
}

/// Capability every decoder adapter provides to the measurement loop.
pub trait FrameSource {
    fn variant(&self) -> DecoderVariant;

    fn advance(&mut self) -> Result<FrameStep, BenchError>;

    fn is_finished(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpuReading {
    pub utilization_percent: f64,
    /// `None` when the device lists no process matching ours.
    pub process_memory_bytes: Option<u64>,
}

/// Instantaneous host and GPU readings taken around each timed decode call.
pub trait TelemetrySource {
    fn gpu(&mut self) -> Result<GpuReading, BenchError>;

    fn cpu_percent(&mut self) -> Result<f64, BenchError>;

    fn resident_memory_bytes(&mut self) -> Result<u64, BenchError>;
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for Box<T> {
    fn gpu(&mut self) -> Result<GpuReading, BenchError> {
        (**self).gpu()
    }

    fn cpu_percent(&mut self) -> Result<f64, BenchError> {
        (**self).cpu_percent()
    }

    fn resident_memory_bytes(&mut self) -> Result<u64, BenchError> {
        (**self).resident_memory_bytes()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("telemetry error: {0}")]
    Telemetry(String),
    #[error("plot error: {0}")]
    Plot(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("report formatting failed: {0}")]
    Format(#[from] std::fmt::Error),
}

impl BenchError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
