//! Frame-by-frame decode benchmarking across hardware, software and capture
//! decoder backends.
//!
//! One shared loop ([`run_decode`]) times every decode call, samples host and
//! GPU telemetry around it, and hands the per-frame sequences to
//! [`summarize`]. [`BenchmarkRunner`] repeats that for each selected
//! [`DecoderVariant`] and writes CSV exports plus a markdown report.

#[cfg(any(
    feature = "backend-openh264",
    all(
        feature = "backend-nvidia",
        any(target_os = "linux", target_os = "windows")
    ),
    test
))]
mod bitstream;
mod bench;
mod config;
mod contract;
mod driver;
#[cfg(all(
    feature = "backend-nvidia",
    any(target_os = "linux", target_os = "windows")
))]
mod nvdec_source;
#[cfg(feature = "backend-openh264")]
mod openh264_source;
#[cfg(feature = "backend-opencv")]
mod opencv_source;
pub mod plot;
mod recorder;
pub mod report;
mod stats;
pub mod telemetry;

pub use bench::{BenchmarkReport, BenchmarkRunner, VariantRun};
pub use config::{BenchConfig, FrameSourceFactory, NativeSources, PAUSE_ENV, feature_for};
pub use contract::{
    BenchError, Codec, DecoderVariant, FrameSource, FrameStep, GpuReading, Metric,
    TelemetrySource, parse_selector,
};
pub use driver::{RunOutcome, StopReason, bytes_to_mb, run_decode, seconds_to_ms};
#[cfg(all(
    feature = "backend-nvidia",
    any(target_os = "linux", target_os = "windows")
))]
pub use nvdec_source::NvdecSource;
#[cfg(feature = "backend-openh264")]
pub use openh264_source::OpenH264Source;
#[cfg(feature = "backend-opencv")]
pub use opencv_source::OpenCvSource;
pub use recorder::{IterationResult, SampleRecorder, SharedSequence};
pub use stats::{
    BenchmarkResult, SummaryRecord, percentile, round2, sample_std_dev, summarize,
};

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("all", &[DecoderVariant::Hardware, DecoderVariant::Software, DecoderVariant::Capture])]
    #[case("ALL", &[DecoderVariant::Hardware, DecoderVariant::Software, DecoderVariant::Capture])]
    #[case("nvdec", &[DecoderVariant::Hardware])]
    #[case("openh264", &[DecoderVariant::Software])]
    #[case("OpenCV", &[DecoderVariant::Capture])]
    fn selector_expands_to_variants(#[case] raw: &str, #[case] expected: &[DecoderVariant]) {
        assert_eq!(parse_selector(raw).unwrap(), expected);
    }

    #[test]
    fn unknown_selector_is_rejected() {
        assert!(matches!(
            parse_selector("ffmpeg"),
            Err(BenchError::InvalidInput(_))
        ));
    }

    #[test]
    fn variant_stems_round_trip() {
        for variant in DecoderVariant::ALL {
            assert_eq!(DecoderVariant::from_file_stem(variant.file_stem()), Some(variant));
        }
        assert_eq!(DecoderVariant::from_file_stem("pyav"), None);
    }

    #[test]
    fn metric_keys_are_unique() {
        let mut keys = Metric::ALL.map(Metric::key).to_vec();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), Metric::ALL.len());
    }
}
