//! Run report files
//!
//! Layout under the report directory:
//!
//! ```text
//! <report_dir>/
//! ├── runs/run_<id>.json
//! ├── latest_run.json
//! └── summary.md
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::markdown::MarkdownGenerator;
use crate::report::RunReport;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type IoResult<T> = Result<T, IoError>;

pub const DEFAULT_REPORT_DIR: &str = "benchmarks/output";

/// Paths written for one report
#[derive(Debug, Clone)]
pub struct WrittenReport {
    pub run: PathBuf,
    pub latest: PathBuf,
    pub summary: PathBuf,
}

pub struct ReportIo {
    output_dir: PathBuf,
    markdown: MarkdownGenerator,
}

impl Default for ReportIo {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_DIR)
    }
}

impl ReportIo {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            markdown: MarkdownGenerator::new(),
        }
    }

    pub fn with_markdown(mut self, markdown: MarkdownGenerator) -> Self {
        self.markdown = markdown;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn runs_dir(&self) -> PathBuf {
        self.output_dir.join("runs")
    }

    pub fn ensure_directories(&self) -> IoResult<()> {
        fs::create_dir_all(self.runs_dir())?;
        Ok(())
    }

    pub fn latest_path(&self) -> PathBuf {
        self.output_dir.join("latest_run.json")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join("summary.md")
    }

    /// Write the run file, the latest-run copy and the markdown summary
    pub fn write_report(&self, report: &RunReport) -> IoResult<WrittenReport> {
        self.ensure_directories()?;

        let run = self.runs_dir().join(format!("run_{}.json", report.run_id));
        write_json(&run, report)?;

        let latest = self.latest_path();
        write_json(&latest, report)?;

        let summary = self.summary_path();
        let mut file = File::create(&summary)?;
        file.write_all(self.markdown.generate(report).as_bytes())?;

        Ok(WrittenReport {
            run,
            latest,
            summary,
        })
    }

    pub fn read_report(&self, path: impl AsRef<Path>) -> IoResult<RunReport> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn read_latest(&self) -> IoResult<RunReport> {
        self.read_report(self.latest_path())
    }
}

fn write_json(path: &Path, report: &RunReport) -> IoResult<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FailureKind, PairOutcome, PairResult};
    use chrono::Utc;
    use uuid::Uuid;

    fn report() -> RunReport {
        let now = Utc::now();
        RunReport::from_outcomes(
            Uuid::new_v4(),
            now,
            now,
            vec![PairOutcome {
                model_id: "cohere.command-r-v1:0".into(),
                prompt_id: "instruct_900".into(),
                family: None,
                result: PairResult::Failed {
                    kind: FailureKind::Invocation,
                    message: "503".into(),
                },
            }],
        )
    }

    #[test]
    fn test_write_and_read_report() {
        let dir = tempfile::tempdir().unwrap();
        let io = ReportIo::new(dir.path().join("output"));
        let report = report();

        let written = io.write_report(&report).unwrap();
        assert!(written.run.exists());
        assert!(written.summary.exists());
        assert!(written
            .run
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains(&report.run_id.to_string()));

        let latest = io.read_latest().unwrap();
        assert_eq!(latest, report);

        let summary = std::fs::read_to_string(written.summary).unwrap();
        assert!(summary.contains("instruct_900"));
    }
}
