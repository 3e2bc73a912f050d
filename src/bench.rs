use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::FrameSourceFactory;
use crate::driver::{RunOutcome, StopReason, run_decode};
use crate::plot::PlotRenderer;
use crate::report::{
    OutputLayout, VariantSummary, write_individual_summary, write_raw_samples, write_report_file,
};
use crate::{BenchConfig, BenchError, BenchmarkResult, DecoderVariant, TelemetrySource};

#[derive(Debug, Clone)]
pub struct VariantRun {
    pub variant: DecoderVariant,
    pub result: BenchmarkResult,
    /// Decode failures, one entry per failed iteration.
    pub decode_errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub runs: Vec<VariantRun>,
    pub report_path: PathBuf,
}

/// Sequences warm-up, measured runs, exports and the final report.
pub struct BenchmarkRunner<'a> {
    config: &'a BenchConfig,
    layout: OutputLayout,
    telemetry: &'a mut dyn TelemetrySource,
    plotter: Option<&'a dyn PlotRenderer>,
    sleep: Box<dyn FnMut(Duration) + 'a>,
}

impl<'a> BenchmarkRunner<'a> {
    pub fn new(config: &'a BenchConfig, telemetry: &'a mut dyn TelemetrySource) -> Self {
        Self {
            config,
            layout: OutputLayout::new(&config.output_dir),
            telemetry,
            plotter: None,
            sleep: Box::new(thread::sleep),
        }
    }

    /// Plots are rendered only when the config asks for them.
    #[must_use]
    pub fn with_plotter(mut self, plotter: &'a dyn PlotRenderer) -> Self {
        self.plotter = Some(plotter);
        self
    }

    #[must_use]
    pub fn with_sleep(mut self, sleep: impl FnMut(Duration) + 'a) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn run(
        &mut self,
        variants: &[DecoderVariant],
        sources: &mut dyn FrameSourceFactory,
    ) -> Result<BenchmarkReport, BenchError> {
        self.config.validate()?;
        if variants.is_empty() {
            return Err(BenchError::InvalidInput(
                "no decoder variant selected".to_string(),
            ));
        }
        self.layout.prepare()?;
        info!(config = %self.config, "starting benchmark");

        if self.config.warmup_runs > 0 {
            println!("Running warmup...");
            for round in 1..=self.config.warmup_runs {
                println!("--- Iteration {round}/{} ---", self.config.warmup_runs);
                for &variant in variants {
                    let outcome = self.decode_once(variant, sources)?;
                    info!(%variant, units = outcome.units, "warm-up run finished");
                }
            }
            self.pause();
        }

        println!("Running benchmark...");
        let mut runs = Vec::with_capacity(variants.len());
        for (position, &variant) in variants.iter().enumerate() {
            runs.push(self.measure_variant(variant, sources)?);
            if position + 1 < variants.len() {
                self.pause();
            }
        }

        let summaries = runs
            .iter()
            .map(|run| VariantSummary::new(run.variant, |metric| run.result.rollup(metric)))
            .collect::<Vec<_>>();
        let report_path = write_report_file(&self.layout, &summaries)?;
        println!("Benchmark result written to: {}", report_path.display());

        Ok(BenchmarkReport { runs, report_path })
    }

    fn measure_variant(
        &mut self,
        variant: DecoderVariant,
        sources: &mut dyn FrameSourceFactory,
    ) -> Result<VariantRun, BenchError> {
        let mut result = BenchmarkResult::new();
        let mut decode_errors = Vec::new();

        for iteration in 1..=self.config.iterations {
            println!(
                "Running {} ({iteration}/{})",
                variant.label(),
                self.config.iterations
            );
            let outcome = self.decode_once(variant, sources)?;
            if let StopReason::DecodeError(message) = &outcome.stop {
                decode_errors.push(message.clone());
            }
            if outcome.result.is_empty() {
                warn!(%variant, iteration, "run recorded no samples");
            }

            write_raw_samples(&self.layout, variant, &outcome.result)?;
            if self.config.plot {
                self.render_plots(variant, &outcome)?;
            }
            result.store(&outcome.result);
            println!(
                "{} finished: {} frames recorded",
                variant.label(),
                outcome.result.frames()
            );
        }

        let summary = VariantSummary::new(variant, |metric| result.rollup(metric));
        let path = write_individual_summary(&self.layout, &summary)?;
        info!(%variant, path = %path.display(), "summary written");

        Ok(VariantRun {
            variant,
            result,
            decode_errors,
        })
    }

    fn decode_once(
        &mut self,
        variant: DecoderVariant,
        sources: &mut dyn FrameSourceFactory,
    ) -> Result<RunOutcome, BenchError> {
        let mut source = sources.open(variant)?;
        run_decode(source.as_mut(), &mut *self.telemetry, self.config.warmup_frames)
    }

    fn render_plots(&self, variant: DecoderVariant, outcome: &RunOutcome) -> Result<(), BenchError> {
        let Some(plotter) = self.plotter else {
            warn!("plotting requested but no plot renderer configured");
            return Ok(());
        };
        for (metric, samples) in outcome.result.iter() {
            plotter.render(samples, &self.layout.plot_png(metric, variant.file_stem()))?;
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.config.pause.is_zero() {
            return;
        }
        info!(pause = ?self.config.pause, "letting system load settle");
        (self.sleep)(self.config.pause);
    }
}
