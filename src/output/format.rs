//! Reporter selection and `format:file` writer specs.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::PathBuf;

use super::json::JsonReporter;
use super::lane::LaneReporter;
use super::noiseless::NoiselessReporter;
use super::tap::TapReporter;
use super::xunit::XUnitReporter;
use crate::error::RunnerError;
use crate::events::TestEventListener;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Lane,
    Tap,
    Json,
    Xunit,
    Noiseless,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lane" => Some(OutputFormat::Lane),
            "tap" => Some(OutputFormat::Tap),
            "json" => Some(OutputFormat::Json),
            "xunit" | "junit" => Some(OutputFormat::Xunit),
            "noiseless" => Some(OutputFormat::Noiseless),
            _ => None,
        }
    }

    /// Like `from_str`, failing with the run's error type.
    pub fn parse(s: &str) -> Result<Self, RunnerError> {
        Self::from_str(s).ok_or_else(|| RunnerError::UnknownFormatter(s.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Lane => "lane",
            OutputFormat::Tap => "tap",
            OutputFormat::Json => "json",
            OutputFormat::Xunit => "xunit",
            OutputFormat::Noiseless => "noiseless",
        }
    }

    /// Build a reporter of this format writing to `sink`.
    pub fn reporter(
        self,
        sink: Box<dyn Write + Send>,
        colorize: bool,
    ) -> Box<dyn TestEventListener> {
        match self {
            OutputFormat::Lane => {
                let reporter = LaneReporter::new(sink);
                Box::new(if colorize { reporter } else { reporter.no_color() })
            }
            OutputFormat::Tap => Box::new(TapReporter::new(sink)),
            OutputFormat::Json => Box::new(JsonReporter::new(sink)),
            OutputFormat::Xunit => Box::new(XUnitReporter::new(sink)),
            OutputFormat::Noiseless => Box::new(NoiselessReporter::new(sink)),
        }
    }

    /// Reporter on the process's stdout, colored when stdout is a terminal.
    pub fn stdout_reporter(self) -> Box<dyn TestEventListener> {
        let colorize = io::stdout().is_terminal();
        self.reporter(Box::new(io::stdout()), colorize)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An extra reporter writing to a file, given as `format:filename`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterSpec {
    pub format: OutputFormat,
    pub path: PathBuf,
}

impl WriterSpec {
    pub fn parse(spec: &str) -> Result<Self, RunnerError> {
        let (format, path) = spec
            .split_once(':')
            .filter(|(format, path)| !format.is_empty() && !path.is_empty())
            .ok_or_else(|| RunnerError::WriterSpec(spec.to_string()))?;

        Ok(Self {
            format: OutputFormat::parse(format)?,
            path: PathBuf::from(path),
        })
    }

    /// Create (truncate) the file and attach an uncolored reporter to it.
    pub fn open(&self) -> Result<Box<dyn TestEventListener>, RunnerError> {
        let file = File::create(&self.path)?;
        Ok(self
            .format
            .reporter(Box::new(BufWriter::new(file)), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("tap"), Some(OutputFormat::Tap));
        assert_eq!(OutputFormat::from_str("LANE"), Some(OutputFormat::Lane));
        assert_eq!(OutputFormat::from_str("junit"), Some(OutputFormat::Xunit));
        assert_eq!(
            OutputFormat::from_str("noiseless"),
            Some(OutputFormat::Noiseless)
        );
        assert_eq!(OutputFormat::from_str("html"), None);
        assert!(matches!(
            OutputFormat::parse("html"),
            Err(RunnerError::UnknownFormatter(_))
        ));
    }

    #[test]
    fn test_writer_spec_parse() {
        let spec = WriterSpec::parse("json:out/results.json").unwrap();
        assert_eq!(spec.format, OutputFormat::Json);
        assert_eq!(spec.path, PathBuf::from("out/results.json"));

        // Only the first colon separates
        let spec = WriterSpec::parse("tap:C:/reports/tap.txt").unwrap();
        assert_eq!(spec.path, PathBuf::from("C:/reports/tap.txt"));

        let spec = WriterSpec::parse("xunit:report.xml").unwrap();
        assert_eq!(spec.format, OutputFormat::Xunit);
    }

    #[test]
    fn test_writer_spec_rejects_malformed() {
        for bad in ["tap", ":file", "tap:", ""] {
            assert!(
                matches!(WriterSpec::parse(bad), Err(RunnerError::WriterSpec(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(matches!(
            WriterSpec::parse("xml:file"),
            Err(RunnerError::UnknownFormatter(_))
        ));
    }

    #[test]
    fn test_writer_spec_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.tap");
        let spec = WriterSpec::parse(&format!("tap:{}", path.display())).unwrap();

        let mut reporter = spec.open().unwrap();
        reporter.begin(1, 0);
        reporter.end(&crate::models::RunSummary::new(1, 0));
        drop(reporter);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("TAP version 13\n1..0\n"));
    }

    #[test]
    fn test_xunit_writer_flushes_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xml");
        let spec = WriterSpec::parse(&format!("xunit:{}", path.display())).unwrap();

        let mut reporter = spec.open().unwrap();
        reporter.begin(2, 0);
        reporter.end(&crate::models::RunSummary::new(2, 0));
        drop(reporter);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<?xml"));
        assert!(content.ends_with("</testsuites>\n"));
    }
}
