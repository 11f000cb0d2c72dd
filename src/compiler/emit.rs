//! Deferred emission: what to write is recorded during compilation, and the
//! package flush decides when each phase is written.

/// The four output phases, in the order the package writes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// One-time setup, e.g. declaring an objective.
    Prep,
    /// Per-activation commands of the unit.
    Init,
    /// Per-timestep maintenance.
    Tick,
    /// Teardown, replayed in reverse order of `Prep`.
    Demo,
}

/// Append-only destination for emitted commands.
pub trait OutputSink {
    fn write_line(&mut self, line: &str);
}

impl OutputSink for Vec<String> {
    fn write_line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// A deferred emission unit: command lines registered into a scope purely so
/// they are written when that scope is flushed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spy {
    pub prep: Vec<String>,
    pub init: Vec<String>,
    pub demo: Vec<String>,
}

impl Spy {
    /// A unit that only writes per-activation commands.
    pub fn init(lines: Vec<String>) -> Self {
        Self {
            init: lines,
            ..Self::default()
        }
    }

    /// A unit that only writes setup and teardown commands.
    pub fn prep_demo(prep: impl Into<String>, demo: impl Into<String>) -> Self {
        Self {
            prep: vec![prep.into()],
            demo: vec![demo.into()],
            ..Self::default()
        }
    }

    pub fn lines(&self, phase: Phase) -> &[String] {
        match phase {
            Phase::Prep => &self.prep,
            Phase::Init => &self.init,
            Phase::Tick => &[],
            Phase::Demo => &self.demo,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prep.is_empty() && self.init.is_empty() && self.demo.is_empty()
    }

    pub fn write(&self, phase: Phase, sink: &mut dyn OutputSink) {
        for line in self.lines(phase) {
            sink.write_line(line);
        }
    }
}
