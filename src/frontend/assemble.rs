use crate::assembler::{self, Entry, LogSink, Program};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Source files are assembled as one program, in the order given.
pub fn read_sources<P: AsRef<Path>>(paths: &[P]) -> Result<String> {
    let mut source = String::new();
    for path in paths {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("could not read source file '{}'", path.display()))?;
        source.push_str(&text);
        if !text.ends_with('\n') {
            source.push('\n');
        }
    }
    Ok(source)
}

pub fn compile_paths<P: AsRef<Path>>(paths: &[P], print_listing: bool) -> Result<Program> {
    let source = read_sources(paths)?;

    if print_listing {
        let mut listing: Vec<Entry> = Vec::new();
        let prog = assembler::compile(&source, &mut listing)?;
        for entry in listing {
            println!("{}", entry);
        }
        Ok(prog)
    } else {
        Ok(assembler::compile(&source, &mut LogSink)?)
    }
}

pub fn default_output_path(first_src: &Path, ext: &str) -> PathBuf {
    let stem = first_src.file_stem().unwrap_or_else(|| first_src.as_os_str());
    PathBuf::from(stem).with_extension(ext)
}
