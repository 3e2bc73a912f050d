use std::fmt::{self, Display};
use std::path::PathBuf;
use std::time::Duration;

use crate::{BenchError, Codec, DecoderVariant, FrameSource};

const DEFAULT_PAUSE: Duration = Duration::from_secs(10);

/// Overrides the default settle pause between decoder variants.
pub const PAUSE_ENV: &str = "VIDEC_BENCH_PAUSE_SECS";

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub input: PathBuf,
    pub codec: Codec,
    pub warmup_frames: usize,
    pub warmup_runs: usize,
    pub iterations: usize,
    pub pause: Duration,
    pub output_dir: PathBuf,
    pub plot: bool,
    pub gpu_index: u32,
    pub chunk_bytes: usize,
}

impl BenchConfig {
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, warmup_frames: usize) -> Self {
        let input = input.into();
        Self {
            codec: Codec::from_path(&input),
            input,
            warmup_frames,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.iterations == 0 {
            return Err(BenchError::InvalidInput(
                "iterations must be >= 1".to_string(),
            ));
        }
        if self.chunk_bytes == 0 {
            return Err(BenchError::InvalidInput(
                "chunk_bytes must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            codec: Codec::H264,
            warmup_frames: 0,
            warmup_runs: 0,
            iterations: 1,
            pause: pause_from_env().unwrap_or(DEFAULT_PAUSE),
            output_dir: PathBuf::from("benchmark-results"),
            plot: false,
            gpu_index: 0,
            chunk_bytes: 65_536,
        }
    }
}

impl Display for BenchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BenchConfig(input={}, codec={}, warmup_frames={}, warmup_runs={}, iterations={}, pause={:?}, output_dir={}, plot={})",
            self.input.display(),
            self.codec,
            self.warmup_frames,
            self.warmup_runs,
            self.iterations,
            self.pause,
            self.output_dir.display(),
            self.plot
        )
    }
}

fn pause_from_env() -> Option<Duration> {
    std::env::var(PAUSE_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Opens a fresh decoder adapter for every run.
pub trait FrameSourceFactory {
    fn open(&mut self, variant: DecoderVariant) -> Result<Box<dyn FrameSource>, BenchError>;
}

impl<F> FrameSourceFactory for F
where
    F: FnMut(DecoderVariant) -> Result<Box<dyn FrameSource>, BenchError>,
{
    fn open(&mut self, variant: DecoderVariant) -> Result<Box<dyn FrameSource>, BenchError> {
        self(variant)
    }
}

/// Opens the compiled-in adapters against `config.input`.
#[derive(Debug, Clone)]
pub struct NativeSources {
    config: BenchConfig,
}

impl NativeSources {
    pub fn new(config: &BenchConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl FrameSourceFactory for NativeSources {
    fn open(&mut self, variant: DecoderVariant) -> Result<Box<dyn FrameSource>, BenchError> {
        match variant {
            #[cfg(all(
                feature = "backend-nvidia",
                any(target_os = "linux", target_os = "windows")
            ))]
            DecoderVariant::Hardware => Ok(Box::new(crate::nvdec_source::NvdecSource::open(
                &self.config.input,
                self.config.codec,
                self.config.gpu_index as usize,
                self.config.chunk_bytes,
            )?)),
            #[cfg(feature = "backend-openh264")]
            DecoderVariant::Software => Ok(Box::new(
                crate::openh264_source::OpenH264Source::open(
                    &self.config.input,
                    self.config.codec,
                    self.config.chunk_bytes,
                )?,
            )),
            #[cfg(feature = "backend-opencv")]
            DecoderVariant::Capture => Ok(Box::new(
                crate::opencv_source::OpenCvSource::open(&self.config.input)?,
            )),
            #[allow(unreachable_patterns)]
            other => Err(BenchError::Unsupported(format!(
                "decoder variant {other} is not compiled in (enable the {} feature)",
                feature_for(other)
            ))),
        }
    }
}

#[must_use]
pub fn feature_for(variant: DecoderVariant) -> &'static str {
    match variant {
        DecoderVariant::Hardware => "backend-nvidia",
        DecoderVariant::Software => "backend-openh264",
        DecoderVariant::Capture => "backend-opencv",
    }
}
