//! Files written under the results directory.
//!
//! ```text
//! <root>/csv/<metric>/<variant>.csv            raw samples, one per row
//! <root>/individual_summary/<variant>.csv      one summary row per metric
//! <root>/plot/<metric>/<variant>.png
//! <root>/report.md
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stats::round2;
use crate::{BenchError, DecoderVariant, IterationResult, Metric, SummaryRecord};

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates every directory the writers below expect.
    pub fn prepare(&self) -> Result<(), BenchError> {
        let mut dirs = vec![self.root.join("individual_summary")];
        for metric in Metric::ALL {
            dirs.push(self.root.join("csv").join(metric.key()));
            dirs.push(self.root.join("plot").join(metric.key()));
        }
        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|err| BenchError::io(&dir, err))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn raw_csv(&self, metric: Metric, stem: &str) -> PathBuf {
        self.root
            .join("csv")
            .join(metric.key())
            .join(format!("{stem}.csv"))
    }

    #[must_use]
    pub fn summary_csv(&self, stem: &str) -> PathBuf {
        self.root
            .join("individual_summary")
            .join(format!("{stem}.csv"))
    }

    #[must_use]
    pub fn plot_png(&self, metric: Metric, stem: &str) -> PathBuf {
        self.root
            .join("plot")
            .join(metric.key())
            .join(format!("{stem}.png"))
    }

    #[must_use]
    pub fn report_md(&self) -> PathBuf {
        self.root.join("report.md")
    }
}

/// Writes each metric's samples of one run, one value per row.
pub fn write_raw_samples(
    layout: &OutputLayout,
    variant: DecoderVariant,
    result: &IterationResult,
) -> Result<(), BenchError> {
    for (metric, samples) in result.iter() {
        let path = layout.raw_csv(metric, variant.file_stem());
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)?;
        for value in samples {
            writer.write_record([value.to_string()])?;
        }
        writer.flush().map_err(|err| BenchError::io(&path, err))?;
        debug!(path = %path.display(), rows = samples.len(), "raw samples written");
    }
    Ok(())
}

/// Reads back one raw sample file.
pub fn read_raw_samples(path: &Path) -> Result<Vec<f64>, BenchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let mut out = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = record.get(0).unwrap_or_default();
        let value = field.trim().parse::<f64>().map_err(|err| {
            BenchError::InvalidInput(format!("{}: bad sample {field:?}: {err}", path.display()))
        })?;
        out.push(value);
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct SummaryRow {
    mean: f64,
    min: f64,
    max: f64,
    q1: f64,
    q2: f64,
    q3: f64,
    stdev: f64,
}

impl From<&SummaryRecord> for SummaryRow {
    fn from(s: &SummaryRecord) -> Self {
        let r = s.rounded();
        Self {
            mean: r.mean,
            min: r.min,
            max: r.max,
            q1: r.q1,
            q2: r.q2,
            q3: r.q3,
            stdev: r.std_dev,
        }
    }
}

impl From<SummaryRow> for SummaryRecord {
    fn from(row: SummaryRow) -> Self {
        Self {
            count: 0,
            mean: row.mean,
            min: row.min,
            max: row.max,
            q1: row.q1,
            q2: row.q2,
            q3: row.q3,
            std_dev: row.stdev,
        }
    }
}

/// Summary of every metric for one variant. `summaries` is indexed like
/// [`Metric::ALL`].
#[derive(Debug, Clone)]
pub struct VariantSummary {
    pub label: String,
    pub stem: String,
    pub summaries: Vec<SummaryRecord>,
}

impl VariantSummary {
    pub fn new(variant: DecoderVariant, summary_of: impl Fn(Metric) -> SummaryRecord) -> Self {
        Self {
            label: variant.label().to_string(),
            stem: variant.file_stem().to_string(),
            summaries: Metric::ALL.into_iter().map(summary_of).collect(),
        }
    }

    #[must_use]
    pub fn summary(&self, metric: Metric) -> SummaryRecord {
        self.summaries
            .get(metric.index())
            .copied()
            .unwrap_or_default()
    }
}

pub fn write_individual_summary(
    layout: &OutputLayout,
    summary: &VariantSummary,
) -> Result<PathBuf, BenchError> {
    let path = layout.summary_csv(&summary.stem);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)?;
    for metric in Metric::ALL {
        writer.serialize(SummaryRow::from(&summary.summary(metric)))?;
    }
    writer.flush().map_err(|err| BenchError::io(&path, err))?;
    Ok(path)
}

pub fn read_individual_summary(path: &Path) -> Result<Vec<SummaryRecord>, BenchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let rows = reader
        .deserialize::<SummaryRow>()
        .map(|row| row.map(SummaryRecord::from))
        .collect::<Result<Vec<_>, _>>()?;
    if rows.len() != Metric::ALL.len() {
        return Err(BenchError::InvalidInput(format!(
            "{}: expected {} summary rows, found {}",
            path.display(),
            Metric::ALL.len(),
            rows.len()
        )));
    }
    Ok(rows)
}

/// Collects every `*.csv` under `individual_summary/`, ordered by file name.
pub fn load_individual_summaries(layout: &OutputLayout) -> Result<Vec<VariantSummary>, BenchError> {
    let dir = layout.root().join("individual_summary");
    let mut paths = fs::read_dir(&dir)
        .map_err(|err| BenchError::io(&dir, err))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect::<Vec<_>>();
    paths.sort();

    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let label = DecoderVariant::from_file_stem(&stem)
            .map(|v| v.label().to_string())
            .unwrap_or_else(|| stem.clone());
        out.push(VariantSummary {
            label,
            stem,
            summaries: read_individual_summary(&path)?,
        });
    }
    Ok(out)
}

/// Markdown document with an HTML summary table and per-metric plot links.
/// Variant rows keep the order of `variants`.
pub fn render_report(variants: &[VariantSummary]) -> Result<String, BenchError> {
    let mut report = String::new();
    let out = &mut report;
    writeln!(out, "# Benchmark Report")?;
    writeln!(out, "<table>")?;
    writeln!(out, "    <tr>")?;
    writeln!(out, "        <th colspan=\"8\">Benchmark Results</th>")?;
    writeln!(out, "    </tr>")?;

    for metric in Metric::ALL {
        writeln!(out, "    <tr>")?;
        writeln!(
            out,
            "        <td colspan=\"8\"><strong>{}</strong></td>",
            metric.label()
        )?;
        writeln!(out, "    </tr>")?;
        write_row(
            out,
            &[
                "Tool",
                "Mean",
                "Min",
                "Max",
                "Q1",
                "Q2",
                "Q3",
                "Standard Deviation",
            ],
        )?;
        for variant in variants {
            let mut cells = vec![variant.label.clone()];
            cells.extend(
                variant
                    .summary(metric)
                    .values()
                    .iter()
                    .map(|v| format!("{:.2}", round2(*v))),
            );
            write_row(out, &cells)?;
        }
    }
    writeln!(out, "</table>")?;

    writeln!(out)?;
    writeln!(out, "# Plots")?;
    for metric in Metric::ALL {
        writeln!(out, "## {}", metric.plot_heading())?;
        for variant in variants {
            writeln!(out, "### {}", variant.label)?;
            writeln!(out, "![](./plot/{}/{}.png)", metric.key(), variant.stem)?;
        }
        writeln!(out)?;
    }
    Ok(report)
}

fn write_row<S: AsRef<str>>(out: &mut String, cells: &[S]) -> std::fmt::Result {
    writeln!(out, "    <tr>")?;
    for cell in cells {
        writeln!(out, "        <td>{}</td>", cell.as_ref())?;
    }
    writeln!(out, "    </tr>")
}

pub fn write_report_file(
    layout: &OutputLayout,
    variants: &[VariantSummary],
) -> Result<PathBuf, BenchError> {
    let path = layout.report_md();
    fs::write(&path, render_report(variants)?).map_err(|err| BenchError::io(&path, err))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SampleRecorder, summarize};

    fn summary_for(variant: DecoderVariant, base: f64) -> VariantSummary {
        VariantSummary::new(variant, |metric| {
            summarize(&[base, base + metric.index() as f64, base * 2.0])
        })
    }

    fn table_rows(report: &str) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        let mut current: Option<Vec<String>> = None;
        for line in report.lines().map(str::trim) {
            match line {
                "<tr>" => current = Some(Vec::new()),
                "</tr>" => rows.extend(current.take().filter(|row| !row.is_empty())),
                _ => {
                    if let (Some(row), Some(cell)) = (
                        current.as_mut(),
                        line.strip_prefix("<td>").and_then(|l| l.strip_suffix("</td>")),
                    ) {
                        row.push(cell.to_string());
                    }
                }
            }
        }
        rows
    }

    #[test]
    fn report_has_one_row_per_variant_per_metric_in_input_order() {
        let variants = [
            summary_for(DecoderVariant::Capture, 1.0),
            summary_for(DecoderVariant::Hardware, 2.0),
            summary_for(DecoderVariant::Software, 3.0),
        ];
        let report = render_report(&variants).unwrap();
        let rows = table_rows(&report);

        let data_rows = rows
            .iter()
            .filter(|r| r.len() == 8 && r[0] != "Tool")
            .collect::<Vec<_>>();
        assert_eq!(data_rows.len(), Metric::ALL.len() * variants.len());
        for chunk in data_rows.chunks(3) {
            let labels = chunk.iter().map(|r| r[0].as_str()).collect::<Vec<_>>();
            assert_eq!(labels, ["OpenCV", "NVDEC", "OpenH264"]);
        }
        for metric in Metric::ALL {
            assert!(report.contains(&format!("<strong>{}</strong>", metric.label())));
            assert!(report.contains(&format!("![](./plot/{}/nvdec.png)", metric.key())));
        }
    }

    #[test]
    fn report_values_use_two_decimals() {
        let variants = [VariantSummary::new(DecoderVariant::Software, |_| {
            summarize(&[1.0, 2.0, 3.0, 4.0])
        })];
        let rows = table_rows(&render_report(&variants).unwrap());
        let first = rows
            .iter()
            .find(|r| r.first().map(String::as_str) == Some("OpenH264"))
            .unwrap();
        assert_eq!(
            &first[1..],
            ["2.50", "1.00", "4.00", "1.75", "2.50", "3.25", "1.29"]
        );
    }

    #[test]
    fn raw_samples_are_written_one_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.prepare().unwrap();

        let mut recorder = SampleRecorder::new();
        for value in [1.25, 0.5, 3.0] {
            for metric in Metric::ALL {
                recorder.record(metric, value);
            }
        }
        write_raw_samples(&layout, DecoderVariant::Hardware, &recorder.freeze()).unwrap();

        let path = layout.raw_csv(Metric::CpuUtilization, "nvdec");
        assert_eq!(fs::read_to_string(&path).unwrap(), "1.25\n0.5\n3\n");
        assert_eq!(read_raw_samples(&path).unwrap(), vec![1.25, 0.5, 3.0]);
    }

    #[test]
    fn individual_summary_round_trips_through_aggregation() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.prepare().unwrap();

        let written = summary_for(DecoderVariant::Software, 1.234);
        let path = write_individual_summary(&layout, &written).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), Metric::ALL.len());
        let first_row = text.lines().next().unwrap();
        assert_eq!(first_row.split(',').count(), 7);
        assert!(first_row.split(',').all(|field| field.parse::<f64>().is_ok()));

        fs::write(layout.summary_csv("zz-external"), &text).unwrap();
        let loaded = load_individual_summaries(&layout).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].label, "OpenH264");
        assert_eq!(loaded[1].label, "zz-external");
        assert_eq!(
            loaded[0].summary(Metric::FrameProcessingTime).min,
            round2(written.summary(Metric::FrameProcessingTime).min)
        );
    }

    #[test]
    fn summary_rows_map_to_metrics_by_position() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.prepare().unwrap();
        let rows = (1..=Metric::ALL.len())
            .map(|i| format!("{i},{i},{i},{i},{i},{i},0.5\n"))
            .collect::<String>();
        fs::write(layout.summary_csv("openh264"), rows).unwrap();

        let loaded = load_individual_summaries(&layout).unwrap();
        for (position, metric) in Metric::ALL.into_iter().enumerate() {
            let summary = loaded[0].summary(metric);
            assert_eq!(summary.mean, (position + 1) as f64, "{metric}");
            assert_eq!(summary.std_dev, 0.5);
        }
    }

    #[test]
    fn truncated_summary_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        fs::write(&path, "1,1,1,1,1,1,0\n2,2,2,2,2,2,0\n").unwrap();
        assert!(matches!(
            read_individual_summary(&path),
            Err(BenchError::InvalidInput(_))
        ));
    }

    #[test]
    fn prepare_creates_metric_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("benchmark-results"));
        layout.prepare().unwrap();
        for metric in Metric::ALL {
            assert!(layout.raw_csv(metric, "x").parent().unwrap().is_dir());
            assert!(layout.plot_png(metric, "x").parent().unwrap().is_dir());
        }
        assert!(layout.summary_csv("x").parent().unwrap().is_dir());
    }
}
