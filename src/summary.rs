//! Run summary: every degraded item of a run, grouped by phase.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};

use crate::utils::path::write_file;
use crate::utils::plural_s;

/// Pipeline phase a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Capture,
    Assets,
    Parity,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Assets => "assets",
            Self::Parity => "parity",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item that did not make it into the bundle intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub phase: Phase,
    /// Route path, asset URL or `route@viewport`.
    pub key: String,
    pub reason: String,
}

impl Failure {
    pub fn new(phase: Phase, key: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            phase,
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Counters and failures accumulated across phases.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub source: Option<String>,
    /// e.g. `routes`, `pages`, `assets.fonts`
    pub counts: BTreeMap<String, usize>,
    pub failures: Vec<Failure>,
}

impl RunSummary {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    pub fn count(&mut self, name: impl Into<String>, value: usize) {
        self.counts.insert(name.into(), value);
    }

    pub fn extend(&mut self, failures: impl IntoIterator<Item = Failure>) {
        self.failures.extend(failures);
    }

    pub fn failures_in(&self, phase: Phase) -> usize {
        self.failures.iter().filter(|f| f.phase == phase).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn grouped(&self) -> BTreeMap<Phase, Vec<&Failure>> {
        let mut groups: BTreeMap<Phase, Vec<&Failure>> = BTreeMap::new();
        for failure in &self.failures {
            groups.entry(failure.phase).or_default().push(failure);
        }
        groups
    }

    /// Print degraded items to stderr, one section per phase.
    pub fn print(&self) {
        for (phase, failures) in self.grouped() {
            eprintln!();
            eprintln!(
                "{} {}",
                phase.as_str().red().bold(),
                format!("({} failure{})", failures.len(), plural_s(failures.len())).dimmed()
            );
            for failure in failures {
                eprintln!("{}{}{}", "[".dimmed(), failure.key.cyan(), "]".dimmed());
                eprintln!("{} {}", "→".red(), failure.reason);
            }
        }
    }

    /// Write `summary.json`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_file(path, json + "\n")
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.failures.len();
        if self.is_clean() {
            write!(f, "{}", "no degraded items".green())
        } else {
            write!(
                f,
                "{} {} {}",
                "found".dimmed(),
                total.to_string().red().bold(),
                format!("degraded item{}", plural_s(total)).dimmed()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_grouped_by_phase_in_pipeline_order() {
        let mut summary = RunSummary::new("https://site.framer.website/");
        summary.extend([
            Failure::new(Phase::Parity, "/@mobile", "timed out after 60s"),
            Failure::new(Phase::Capture, "/pricing", "timed out after 60s"),
            Failure::new(Phase::Assets, "https://x/y.png", "HTTP 404"),
        ]);
        let phases: Vec<_> = summary.grouped().into_keys().collect();
        assert_eq!(phases, vec![Phase::Capture, Phase::Assets, Phase::Parity]);
        assert_eq!(summary.failures_in(Phase::Capture), 1);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_write_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.json");
        let mut summary = RunSummary::new("https://a.com/");
        summary.count("routes", 3);
        summary.extend([Failure::new(Phase::Capture, "/x", "boom")]);
        summary.write(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["counts"]["routes"], 3);
        assert_eq!(value["failures"][0]["phase"], "capture");
        assert_eq!(value["failures"][0]["key"], "/x");
    }
}
