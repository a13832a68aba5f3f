use super::{
    assemble, assets,
    run::execute::{self, AbortAction, Config, Summary, Verbosity},
};
use crate::spec::types::hw::Word;
use crate::vm::State;
use ansi_term::Color::{Green, Red};
use anyhow::{anyhow, Context, Result};
use derive_more::Constructor;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A suite unit: one source file, or a directory whose source files are
/// assembled together.
#[derive(Constructor)]
struct UnitSrc {
    name: OsString,
    sources: Vec<PathBuf>,
}

#[derive(Constructor)]
struct UnitBin {
    words: Vec<Word>,
}

impl UnitSrc {
    fn assemble(&self) -> Result<UnitBin> {
        Ok(UnitBin::new(assemble::compile_paths(&self.sources, false)?.words))
    }
}

impl UnitBin {
    fn execute(&self, max_instructions: Option<u64>) -> Result<Summary> {
        let mut vm = execute::boot(&self.words)?;
        Ok(execute::execute(
            &Config {
                max_instructions,
                abort_action: AbortAction::Stop,
                print_marginals: false,
                verbosity: Verbosity::Silent,
            },
            &mut vm,
        ))
    }
}

pub fn run_suite(
    suite_name: &OsString,
    suite_root_dir: &Path,
    only_this: Option<&OsString>,
    max_instructions: Option<u64>,
) -> Result<bool> {
    let suite_dir = suite_root_dir.join(suite_name);
    let all_units = find_units(&suite_dir)?;

    let mut selected_units = match only_this {
        None => all_units,
        Some(only_this) => vec![all_units
            .into_iter()
            .find(|unit| &unit.name == only_this)
            .ok_or_else(|| anyhow!("no unit named '{}' in suite", only_this.to_string_lossy()))?],
    };

    selected_units.sort_unstable_by(|unit1, unit2| unit1.name.cmp(&unit2.name));

    Ok(run_units(
        &suite_name.to_string_lossy(),
        max_instructions,
        &selected_units,
    ))
}

fn is_source(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == assets::SOURCE_EXT)
}

fn unit_name(path: &Path) -> OsString {
    path.file_stem()
        .unwrap_or_else(|| path.as_os_str())
        .to_owned()
}

fn find_file_unit(path: &Path) -> Option<UnitSrc> {
    if !is_source(path) {
        return None;
    }

    Some(UnitSrc::new(unit_name(path), vec![PathBuf::from(path)]))
}

fn find_dir_unit(path: &Path) -> Result<Option<UnitSrc>> {
    let mut sources = path
        .read_dir()
        .with_context(|| format!("could not read unit directory '{}'", path.display()))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()?;
    sources.retain(|path| is_source(path));
    sources.sort();

    if sources.is_empty() {
        Ok(None)
    } else {
        Ok(Some(UnitSrc::new(unit_name(path), sources)))
    }
}

fn find_units(suite_dir: &Path) -> Result<Vec<UnitSrc>> {
    let mut units = Vec::new();

    for entry in suite_dir
        .read_dir()
        .with_context(|| format!("could not read suite directory '{}'", suite_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let typ = entry.file_type()?;

        let unit = if typ.is_file() {
            find_file_unit(&path)
        } else if typ.is_dir() {
            find_dir_unit(&path)?
        } else {
            None
        };
        units.extend(unit);
    }

    Ok(units)
}

fn run_units(name: &str, max_instructions: Option<u64>, units: &[UnitSrc]) -> bool {
    let name_pad = units.iter().map(|unit| unit.name.len()).max().unwrap_or(0);

    println!("Running suite: '{}' ({} units)", name, units.len());
    println!("{:-<line_len$}", "", line_len = name_pad + 45);

    let passes = units
        .iter()
        .enumerate()
        .filter(|(num, unit)| run_unit(unit, num + 1, name_pad, max_instructions))
        .count();
    let success = passes == units.len();

    println!("{:-<line_len$}", "", line_len = name_pad + 45);
    println!(
        "Suite Result: {}, {}/{} passes",
        if success {
            Green.bold().paint("SUCCESS")
        } else {
            Red.bold().paint("FAILED")
        },
        passes,
        units.len()
    );

    success
}

fn run_unit(src: &UnitSrc, num: usize, name_pad: usize, max_instructions: Option<u64>) -> bool {
    let summary = src
        .assemble()
        .map_err(|err| (Red.bold().paint("FAIL: ASSEMBLY ERROR"), err))
        .and_then(|bin| {
            bin.execute(max_instructions)
                .map_err(|err| (Red.bold().paint("FAIL: LOAD ERROR"), err))
        });

    let (success, msg) = match summary {
        Err((label, err)) => (
            false,
            format!("{}:\n\t{}", label, format!("{:#}", err).replace("\n", "\n\t")),
        ),
        Ok(summary) => {
            let msg = match (summary.timeout, summary.state) {
                (true, _) => format!(
                    "{} after {} instructions ({}ms)",
                    Red.bold().paint("FAIL: DETERMINISTIC TIMEOUT"),
                    summary.instructions,
                    summary.real_ns_elapsed / 1000 / 1000
                ),
                (false, State::Halted) => format!(
                    "{} {:7} instructions {: >4}ms  ({: >5.2}MHz)",
                    Green.bold().paint("PASS"),
                    summary.instructions,
                    summary.real_ns_elapsed / 1000 / 1000,
                    summary.to_effective_freq_megahertz(),
                ),
                (false, state) => format!("{}", Red.bold().paint(format!("FAIL: {}", state).to_uppercase())),
            };

            (summary.state == State::Halted && !summary.timeout, msg)
        }
    };

    let name = src.name.to_string_lossy();
    println!(
        "Unit {:2}: {} {}{}",
        num,
        name,
        " ".repeat(name_pad - src.name.len()),
        msg
    );

    success
}
