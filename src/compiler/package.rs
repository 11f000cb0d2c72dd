//! The flushed output of a compilation: command lines per function path.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use super::context::Context;
use super::emit::{OutputSink, Phase};
use super::error::CompileError;
use super::scope::{Entry, EntryKind};

/// Setup function: every `Prep` line, then the global scope's `Init` lines.
pub const LOAD: &str = "load";
/// Per-timestep function, only present when something writes to it.
pub const TICK: &str = "tick";
/// Teardown function: every `Demo` line, last registered first.
pub const UNLOAD: &str = "unload";

pub const PHASE_FUNCTIONS: &[&str] = &[LOAD, TICK, UNLOAD];

#[derive(Debug, Clone, Serialize)]
pub struct Package {
    pub namespace: String,
    /// Function path to its lines, phase functions first, then units in
    /// the order they were opened.
    pub functions: IndexMap<String, Vec<String>>,
}

impl Package {
    pub fn flush(ctx: &Context) -> Result<Self, CompileError> {
        let scopes = ctx.scopes();
        let global = scopes.unit_entries(ctx.global_scope())?;
        let units = ctx
            .units()
            .iter()
            .map(|unit| Ok((unit.path.as_str(), scopes.unit_entries(unit.scope)?)))
            .collect::<Result<Vec<_>, CompileError>>()?;
        let roots = || std::iter::once(&global).chain(units.iter().map(|(_, entries)| entries));

        let mut load = Vec::new();
        for entries in roots() {
            write_phase(ctx, entries, Phase::Prep, &mut load)?;
        }
        write_phase(ctx, &global, Phase::Init, &mut load)?;

        let mut tick = Vec::new();
        for entries in roots() {
            write_phase(ctx, entries, Phase::Tick, &mut tick)?;
        }

        let mut unload = Vec::new();
        for entries in roots() {
            write_phase(ctx, entries, Phase::Demo, &mut unload)?;
        }
        unload.reverse();

        let mut functions = IndexMap::new();
        functions.insert(LOAD.to_string(), load);
        if !tick.is_empty() {
            functions.insert(TICK.to_string(), tick);
        }
        functions.insert(UNLOAD.to_string(), unload);
        for (path, entries) in &units {
            let mut lines = Vec::new();
            write_phase(ctx, entries, Phase::Init, &mut lines)?;
            functions.insert((*path).to_string(), lines);
        }

        log::debug!("flushed {} functions", functions.len());
        Ok(Self {
            namespace: ctx.config().namespace.clone(),
            functions,
        })
    }

    /// Write `<dir>/<path>.mcfunction` per function. Returns the files written.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.functions.len());
        for (path, lines) in &self.functions {
            let file = dir.join(format!("{path}.mcfunction"));
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut text = lines.join("\n");
            if !text.is_empty() {
                text.push('\n');
            }
            fs::write(&file, text)?;
            written.push(file);
        }
        Ok(written)
    }
}

fn write_phase(ctx: &Context, entries: &[&Entry], phase: Phase, sink: &mut dyn OutputSink) -> Result<(), CompileError> {
    for entry in entries {
        match &entry.kind {
            EntryKind::Variable(id) => {
                let var = ctx.var(*id)?;
                let def = ctx.type_def(var.type_name, var.trace)?;
                if let Some(hook) = def.hooks.get(phase) {
                    hook(var, sink);
                }
            }
            EntryKind::Spy(spy) => spy.write(phase, sink),
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compiler::compile_source;
    use crate::compiler::trace::SourceId;
    use crate::config::CompilerConfig;

    fn package(src: &str) -> Package {
        compile_source(SourceId(0), src, CompilerConfig::default()).unwrap()
    }

    #[test]
    fn register_objective_is_set_up_first_and_torn_down_last() {
        let package = package("objective kills = new objective(\"playerKillCount\", \"kills\");");
        assert_eq!(
            package.functions[LOAD],
            vec!["scoreboard objectives add mcs.vars dummy", "scoreboard objectives add kills playerKillCount"]
        );
        assert_eq!(
            package.functions[UNLOAD],
            vec!["scoreboard objectives remove kills", "scoreboard objectives remove mcs.vars"]
        );
    }

    #[test]
    fn copies_of_an_objective_are_not_set_up_twice() {
        let package = package("objective a = new objective(); objective b = a;");
        assert_eq!(package.functions[LOAD].len(), 2);
    }

    #[test]
    fn tick_is_omitted_and_units_follow_phase_functions() {
        let package = package("int x = 1; if (x) { x = 2; }");
        let keys: Vec<_> = package.functions.keys().map(String::as_str).collect();
        assert_eq!(keys[..3], [LOAD, UNLOAD, "main"]);
        assert!(!package.functions.contains_key(TICK));
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn writes_one_file_per_function() {
        let package = package("int x = 1; if (x) { x = 2; }");
        let dir = std::env::temp_dir().join(format!("mcs-package-{}", std::process::id()));
        let written = package.write_to(&dir).unwrap();
        assert_eq!(written.len(), package.functions.len());
        let main = fs::read_to_string(dir.join("main.mcfunction")).unwrap();
        assert!(main.starts_with("scoreboard players set main.x mcs.vars 1\n"));
        assert!(written.iter().any(|path| path.parent() == Some(dir.join("main").as_path())));
        fs::remove_dir_all(&dir).unwrap();
    }
}
