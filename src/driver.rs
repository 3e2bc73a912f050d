use std::time::Instant;

use tracing::{debug, warn};

use crate::{
    BenchError, FrameSource, FrameStep, IterationResult, Metric, SampleRecorder, TelemetrySource,
};

#[must_use]
pub fn seconds_to_ms(seconds: f64) -> f64 {
    seconds * 1_000.0
}

/// Decimal megabytes.
#[must_use]
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1_000_000.0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    DecodeError(String),
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub result: IterationResult,
    pub stop: StopReason,
    /// Units decoded, warm-up included.
    pub units: usize,
    /// Pictures produced over the whole run, warm-up included.
    pub pictures: usize,
}

/// Drives `source` to end of stream, recording one sample per unit after
/// the first `warmup_frames` units.
///
/// The GPU reading is taken before the timed call, CPU and resident memory
/// after it; only `advance` sits inside the measured interval. A decode
/// failure ends the run and keeps what was recorded. A telemetry failure is
/// returned as an error.
pub fn run_decode<S, T>(
    source: &mut S,
    telemetry: &mut T,
    warmup_frames: usize,
) -> Result<RunOutcome, BenchError>
where
    S: FrameSource + ?Sized,
    T: TelemetrySource + ?Sized,
{
    let variant = source.variant();
    let mut recorder = SampleRecorder::new();
    let mut units = 0usize;
    let mut pictures = 0usize;

    let stop = loop {
        if source.is_finished() {
            break StopReason::EndOfStream;
        }

        let gpu = telemetry.gpu()?;

        let start = Instant::now();
        let step = source.advance();
        let elapsed = start.elapsed();

        let frames = match step {
            Ok(FrameStep::Decoded { frames }) => frames,
            Ok(FrameStep::EndOfStream) => break StopReason::EndOfStream,
            Err(err) => {
                warn!(%variant, unit = units + 1, error = %err, "decode failed, stopping run");
                break StopReason::DecodeError(err.to_string());
            }
        };
        units += 1;
        pictures += frames;

        let cpu = telemetry.cpu_percent()?;
        let rss = telemetry.resident_memory_bytes()?;

        if units <= warmup_frames {
            debug!(%variant, unit = units, "warm-up unit discarded");
            continue;
        }

        recorder.record(
            Metric::FrameProcessingTime,
            seconds_to_ms(elapsed.as_secs_f64()),
        );
        recorder.record(Metric::CpuUtilization, cpu);
        recorder.record(Metric::MemoryUtilization, bytes_to_mb(rss));
        recorder.record(Metric::GpuUtilization, gpu.utilization_percent);
        recorder.record(
            Metric::GpuMemoryUtilization,
            gpu.process_memory_bytes.map(bytes_to_mb).unwrap_or(0.0),
        );
    };

    debug!(%variant, units, pictures, recorded = recorder.len(), ?stop, "run finished");
    Ok(RunOutcome {
        result: recorder.freeze(),
        stop,
        units,
        pictures,
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{DecoderVariant, GpuReading};

    struct Scripted {
        remaining: usize,
        fail_at: Option<usize>,
        seen: usize,
    }

    impl Scripted {
        fn frames(n: usize) -> Self {
            Self {
                remaining: n,
                fail_at: None,
                seen: 0,
            }
        }
    }

    impl FrameSource for Scripted {
        fn variant(&self) -> DecoderVariant {
            DecoderVariant::Software
        }

        fn advance(&mut self) -> Result<FrameStep, BenchError> {
            self.seen += 1;
            if self.fail_at == Some(self.seen) {
                return Err(BenchError::Decode("corrupt unit".to_string()));
            }
            if self.remaining == 0 {
                return Ok(FrameStep::EndOfStream);
            }
            self.remaining -= 1;
            Ok(FrameStep::Decoded { frames: 1 })
        }

        fn is_finished(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct Fixed {
        gpu_memory: Option<u64>,
        fail_cpu: bool,
    }

    impl TelemetrySource for Fixed {
        fn gpu(&mut self) -> Result<GpuReading, BenchError> {
            Ok(GpuReading {
                utilization_percent: 12.0,
                process_memory_bytes: self.gpu_memory,
            })
        }

        fn cpu_percent(&mut self) -> Result<f64, BenchError> {
            if self.fail_cpu {
                return Err(BenchError::Telemetry("cpu counters gone".to_string()));
            }
            Ok(40.0)
        }

        fn resident_memory_bytes(&mut self) -> Result<u64, BenchError> {
            Ok(250_000_000)
        }
    }

    #[rstest]
    #[case(0, 5, 5)]
    #[case(2, 5, 3)]
    #[case(5, 5, 0)]
    #[case(9, 5, 0)]
    fn warmup_units_are_discarded(
        #[case] warmup: usize,
        #[case] total: usize,
        #[case] recorded: usize,
    ) {
        let outcome = run_decode(&mut Scripted::frames(total), &mut Fixed::default(), warmup)
            .unwrap();
        assert_eq!(outcome.stop, StopReason::EndOfStream);
        assert_eq!(outcome.units, total);
        for (_, samples) in outcome.result.iter() {
            assert_eq!(samples.len(), recorded);
        }
    }

    #[test]
    fn telemetry_is_converted_per_sample() {
        let mut telemetry = Fixed {
            gpu_memory: Some(3_500_000),
            fail_cpu: false,
        };
        let outcome = run_decode(&mut Scripted::frames(2), &mut telemetry, 0).unwrap();
        let result = outcome.result;

        assert_eq!(result.samples(Metric::CpuUtilization), &[40.0, 40.0]);
        assert_eq!(result.samples(Metric::MemoryUtilization), &[250.0, 250.0]);
        assert_eq!(result.samples(Metric::GpuUtilization), &[12.0, 12.0]);
        assert_eq!(result.samples(Metric::GpuMemoryUtilization), &[3.5, 3.5]);
        assert!(
            result
                .samples(Metric::FrameProcessingTime)
                .iter()
                .all(|ms| *ms >= 0.0)
        );
    }

    #[test]
    fn missing_gpu_process_records_zero() {
        let outcome = run_decode(&mut Scripted::frames(3), &mut Fixed::default(), 0).unwrap();
        assert_eq!(
            outcome.result.samples(Metric::GpuMemoryUtilization),
            &[0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn decode_error_keeps_partial_samples() {
        let mut source = Scripted {
            remaining: 10,
            fail_at: Some(4),
            seen: 0,
        };
        let outcome = run_decode(&mut source, &mut Fixed::default(), 1).unwrap();
        assert_eq!(
            outcome.stop,
            StopReason::DecodeError("decode error: corrupt unit".to_string())
        );
        assert_eq!(outcome.units, 3);
        assert_eq!(outcome.result.frames(), 2);
    }

    #[test]
    fn decode_error_on_first_unit_yields_empty_result() {
        let mut source = Scripted {
            remaining: 10,
            fail_at: Some(1),
            seen: 0,
        };
        let outcome = run_decode(&mut source, &mut Fixed::default(), 0).unwrap();
        assert!(outcome.result.is_empty());
        assert!(matches!(outcome.stop, StopReason::DecodeError(_)));
    }

    #[test]
    fn telemetry_error_is_propagated() {
        let mut telemetry = Fixed {
            gpu_memory: None,
            fail_cpu: true,
        };
        let err = run_decode(&mut Scripted::frames(3), &mut telemetry, 0).unwrap_err();
        assert!(matches!(err, BenchError::Telemetry(_)));
    }

    #[test]
    fn conversions() {
        assert_eq!(bytes_to_mb(1_000_000), 1.0);
        assert_eq!(bytes_to_mb(0), 0.0);
        assert!((seconds_to_ms(0.001) - 1.0).abs() < 1e-12);
        assert!(seconds_to_ms(0.002) > seconds_to_ms(0.001));
    }
}
