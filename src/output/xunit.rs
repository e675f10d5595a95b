//! JUnit-style XML report, written once the run ends.
//!
//! Results are buffered because the suite totals go in the opening tag.

use chrono::{SecondsFormat, Utc};
use std::fmt::Write as _;
use std::io::Write;
use tracing::debug;

use crate::events::{TestEventListener, WorkerInfo};
use crate::models::{RunSummary, Severity, TestResult};

pub struct XUnitReporter {
    sink: Box<dyn Write + Send>,
    timestamp: String,
    cases: Vec<(String, TestResult)>,
}

impl XUnitReporter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink,
            timestamp: String::new(),
            cases: Vec::new(),
        }
    }

    fn render(&self, summary: &RunSummary) -> String {
        let mut failures = 0;
        let mut errors = summary.abandoned.len();
        for (_, result) in &self.cases {
            match result.worst_severity() {
                Some(Severity::Error) => errors += 1,
                Some(Severity::Failure) => failures += 1,
                _ => {}
            }
        }
        let tests = self.cases.len() + summary.abandoned.len();
        let time = summary.elapsed.as_secs_f64();

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            xml,
            "<testsuites tests=\"{tests}\" failures=\"{failures}\" errors=\"{errors}\" time=\"{time:.3}\">"
        );
        let _ = writeln!(
            xml,
            "  <testsuite name=\"testlane\" tests=\"{tests}\" failures=\"{failures}\" errors=\"{errors}\" skipped=\"0\" time=\"{time:.3}\" timestamp=\"{}\">",
            self.timestamp
        );

        for (lane, result) in &self.cases {
            let _ = write!(
                xml,
                "    <testcase classname=\"{}\" name=\"{}\" time=\"{:.3}\"",
                escape(&result.class),
                escape(&result.name),
                result.elapsed.as_secs_f64()
            );
            if result.errors.is_empty() {
                xml.push_str("/>\n");
                continue;
            }
            xml.push_str(">\n");
            let _ = writeln!(
                xml,
                "      <properties><property name=\"worker\" value=\"{}\"/></properties>",
                escape(lane)
            );

            let mut warnings = Vec::new();
            for entry in &result.errors {
                let tag = match entry.severity {
                    Severity::Error => "error",
                    Severity::Failure => "failure",
                    Severity::Warning => {
                        warnings.push(entry.message.as_str());
                        continue;
                    }
                };
                let _ = writeln!(
                    xml,
                    "      <{tag} type=\"{tag}\" message=\"{}\">{}</{tag}>",
                    escape(first_line(&entry.message)),
                    escape(&entry.message)
                );
            }
            if !warnings.is_empty() {
                let _ = writeln!(
                    xml,
                    "      <system-err>{}</system-err>",
                    escape(&warnings.join("\n"))
                );
            }
            xml.push_str("    </testcase>\n");
        }

        for abandoned in &summary.abandoned {
            let status = abandoned
                .exit_code
                .map_or_else(|| "unknown".to_string(), |code| code.to_string());
            let _ = writeln!(
                xml,
                "    <testcase classname=\"{}\" name=\"{}\" time=\"0.000\">",
                escape(&abandoned.request.class),
                escape(&abandoned.request.name)
            );
            let _ = writeln!(
                xml,
                "      <error type=\"abandoned\" message=\"{} exited with status {}\"/>",
                WorkerInfo::label_for(abandoned.lane),
                status
            );
            xml.push_str("    </testcase>\n");
        }

        xml.push_str("  </testsuite>\n</testsuites>\n");
        xml
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

/// Escape text for use in XML attributes and character data.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Not representable in XML 1.0
            c if (c as u32) < 0x20 && !matches!(c, '\n' | '\r' | '\t') => {}
            c => out.push(c),
        }
    }
    out
}

impl TestEventListener for XUnitReporter {
    fn begin(&mut self, _worker_count: usize, _expected_tests: usize) {
        self.timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.cases.clear();
    }

    fn test_completed(&mut self, worker: &WorkerInfo, result: &TestResult) {
        self.cases.push((worker.label.clone(), result.clone()));
    }

    fn end(&mut self, summary: &RunSummary) {
        let xml = self.render(summary);
        let written = self
            .sink
            .write_all(xml.as_bytes())
            .and_then(|()| self.sink.flush());
        if let Err(e) = written {
            debug!("XUnit reporter write failed: {}", e);
        }
    }
}
