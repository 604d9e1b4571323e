//! Provenance record stored next to every result file.

use std::env;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct Callsite {
    pub file: &'static str,
    pub line: u32,
}

/// Code revision, library version and run parameters of one result.
#[derive(Debug, Serialize)]
pub struct Provenance {
    pub code_rev: String,
    pub version: &'static str,
    pub callsite: Callsite,
    pub params: Value,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
}

impl Provenance {
    /// Record taken at the caller's location.
    #[track_caller]
    pub fn capture(params: Value) -> Self {
        let at = Location::caller();
        Self {
            code_rev: code_rev(),
            version: adjdec::VERSION,
            callsite: Callsite {
                file: at.file(),
                line: at.line(),
            },
            params,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }
}

/// `runs/cube.json` -> `runs/cube.provenance.json`.
pub fn sidecar_path(result: &Path) -> PathBuf {
    result.with_extension("provenance.json")
}

/// `GIT_COMMIT` baked in at build time or set at run time, else `git
/// rev-parse HEAD`, else `"unknown"`.
pub fn code_rev() -> String {
    option_env!("GIT_COMMIT")
        .map(str::to_owned)
        .filter(|rev| !rev.is_empty())
        .or_else(|| env::var("GIT_COMMIT").ok().filter(|rev| !rev.is_empty()))
        .or_else(git_head)
        .unwrap_or_else(|| "unknown".to_owned())
}

fn git_head() -> Option<String> {
    let out = Command::new("git").args(["rev-parse", "HEAD"]).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let rev = String::from_utf8(out.stdout).ok()?;
    Some(rev.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sidecar_sits_next_to_the_result() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/runs/cube.json")),
            Path::new("/tmp/runs/cube.provenance.json")
        );
        assert_eq!(
            sidecar_path(Path::new("out/cube.result.json")),
            Path::new("out/cube.result.provenance.json")
        );
        assert_eq!(sidecar_path(Path::new("out")), Path::new("out.provenance.json"));
    }

    #[test]
    fn capture_records_the_caller_and_inputs() {
        let record = Provenance::capture(json!({"threads": 2})).with_input("problem.json");
        assert!(record.callsite.file.ends_with("provenance.rs"));
        assert_eq!(record.version, adjdec::VERSION);
        assert_eq!(record.inputs, vec![PathBuf::from("problem.json")]);
        assert!(record.outputs.is_empty());
        assert!(!record.code_rev.is_empty());
    }
}
