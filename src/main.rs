use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use videc_bench::plot::PngLinePlotter;
use videc_bench::telemetry::{ProcessHandle, SystemTelemetry};
use videc_bench::{
    BenchConfig, BenchmarkRunner, Codec, DecoderVariant, NativeSources, parse_selector,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CodecArg {
    H264,
    Hevc,
}

impl From<CodecArg> for Codec {
    fn from(value: CodecArg) -> Self {
        match value {
            CodecArg::H264 => Codec::H264,
            CodecArg::Hevc => Codec::Hevc,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "videc-bench",
    version,
    about = "Benchmark frame decoding across NVDEC, OpenH264 and OpenCV"
)]
struct Args {
    /// all | nvdec | openh264 | opencv
    #[arg(value_parser = parse_decoders)]
    decoder: Selection,
    /// Video file to decode
    input: PathBuf,
    /// Leading frames decoded but not recorded
    warmup_frames: usize,
    #[arg(long, default_value_t = 1)]
    iterations: usize,
    /// Full unrecorded decode passes per variant before measuring
    #[arg(long, default_value_t = 0)]
    warmup_runs: usize,
    /// Settle time between variants [default: 10, or $VIDEC_BENCH_PAUSE_SECS]
    #[arg(long)]
    pause_secs: Option<f64>,
    #[arg(long, default_value = "benchmark-results")]
    output_dir: PathBuf,
    /// Render per-metric PNG line charts
    #[arg(long, default_value_t = false)]
    plot: bool,
    #[arg(long, default_value_t = 0)]
    gpu_index: u32,
    /// Elementary stream codec; inferred from the file extension when omitted
    #[arg(long, value_enum)]
    codec: Option<CodecArg>,
    #[arg(long, default_value_t = 65536)]
    chunk_bytes: usize,
}

#[derive(Debug, Clone)]
struct Selection(Vec<DecoderVariant>);

fn parse_decoders(raw: &str) -> Result<Selection, String> {
    parse_selector(raw)
        .map(Selection)
        .map_err(|err| err.to_string())
}

impl Args {
    fn to_config(&self) -> Result<BenchConfig> {
        let mut config = BenchConfig::new(&self.input, self.warmup_frames);
        if let Some(codec) = self.codec {
            config.codec = codec.into();
        }
        if let Some(secs) = self.pause_secs {
            anyhow::ensure!(
                secs.is_finite() && secs >= 0.0,
                "--pause-secs must be a non-negative number"
            );
            config.pause = Duration::from_secs_f64(secs);
        }
        config.iterations = self.iterations;
        config.warmup_runs = self.warmup_runs;
        config.output_dir = self.output_dir.clone();
        config.plot = self.plot;
        config.gpu_index = self.gpu_index;
        config.chunk_bytes = self.chunk_bytes;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            println!("{}", err.render());
            return ExitCode::from(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.to_config()?;
    let process = ProcessHandle::current().context("resolve benchmark process")?;
    let mut telemetry = SystemTelemetry::detect(&process, config.gpu_index);
    let plotter = PngLinePlotter::default();
    let mut sources = NativeSources::new(&config);

    let report = BenchmarkRunner::new(&config, &mut telemetry)
        .with_plotter(&plotter)
        .run(&args.decoder.0, &mut sources)
        .with_context(|| format!("benchmark failed for input {}", config.input.display()))?;

    for run in &report.runs {
        for message in &run.decode_errors {
            println!("{}: decode stopped early: {message}", run.variant.label());
        }
    }
    Ok(())
}
