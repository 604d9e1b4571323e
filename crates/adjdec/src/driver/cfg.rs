//! Run configuration.

use std::fmt;

use super::RunError;

/// Worker threads per node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Threads {
    /// One worker per logical CPU.
    #[default]
    Auto,
    Fixed(usize),
}

impl Threads {
    /// Resolved once per run; zero threads is a configuration error.
    pub fn resolve(self) -> Result<usize, RunError> {
        let n = match self {
            Threads::Auto => num_cpus::get(),
            Threads::Fixed(n) => n,
        };
        if n == 0 {
            return Err(RunError::NoThreads);
        }
        Ok(n)
    }
}

/// What the rows of the search are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Input: homogenized vertices and rays. Output: facet inequalities.
    #[default]
    Facet,
    /// Input: inequalities. Output: vertices and rays. No equation
    /// extraction, no map normalization.
    Vertex,
}

impl SearchMode {
    /// Label used in logs for the rows being discovered.
    pub fn label(self) -> &'static str {
        match self {
            SearchMode::Facet => "Inequalities",
            SearchMode::Vertex => "Vertices / Rays",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchMode::Facet => "facet",
            SearchMode::Vertex => "vertex",
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RunCfg {
    pub threads: Threads,
    pub mode: SearchMode,
}

impl Default for RunCfg {
    fn default() -> Self {
        Self {
            threads: Threads::Auto,
            mode: SearchMode::Facet,
        }
    }
}

impl RunCfg {
    pub fn with_threads(mut self, n: usize) -> Self {
        self.threads = Threads::Fixed(n);
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }
}
