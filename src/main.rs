//! vm-translator – Hack VM to Hack assembly (CLI)

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use log::{debug, info, LevelFilter};
use tempfile::NamedTempFile;

use vm_translator::{translate_unit, Translator};

#[derive(Parser, Debug)]
#[command(author, version, about = "Hack VM translator")]
struct Cli {
    /// A `.vm` file, or a directory of them
    input: PathBuf,

    /// Output `.asm` file (default: beside the input, named after it)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Start with `SP = 256; call Sys.init 0`
    #[arg(long)]
    bootstrap: bool,

    /// Annotate the output with the VM command behind each block
    #[arg(long)]
    comments: bool,

    /// One `.asm` per `.vm` unit instead of a single program
    #[arg(long, conflicts_with_all = ["output", "bootstrap"])]
    split: bool,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// One `.vm` source file; `name` qualifies its statics
struct Unit {
    name: String,
    path: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let units = discover(&cli.input)?;
    if cli.split {
        translate_split(&cli, &units)
    } else {
        translate_single(&cli, &units)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn is_vm(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "vm")
}

fn unit_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("can't name a unit after {}", path.display()))
}

/// The `.vm` files to translate, sorted by name when reading a directory.
fn discover(input: &Path) -> Result<Vec<Unit>> {
    let mut paths = vec![];
    if input.is_dir() {
        for entry in fs::read_dir(input).with_context(|| format!("can't read {}", input.display()))? {
            let path = entry?.path();
            if path.is_file() && is_vm(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        if paths.is_empty() {
            bail!("no .vm files in {}", input.display());
        }
    } else if is_vm(input) {
        paths.push(input.to_path_buf());
    } else {
        bail!("{} is neither a .vm file nor a directory", input.display());
    }

    paths
        .into_iter()
        .map(|path| -> Result<Unit> { Ok(Unit { name: unit_name(&path)?, path }) })
        .collect()
}

/// `Foo.vm` -> `Foo.asm`; `dir/` -> `dir/dir.asm`
fn default_output(input: &Path) -> Result<PathBuf> {
    if input.is_dir() {
        let dir = input
            .canonicalize()
            .with_context(|| format!("can't resolve {}", input.display()))?;
        let name = dir
            .file_name()
            .and_then(|s| s.to_str())
            .with_context(|| format!("can't name output after {}", dir.display()))?
            .to_string();
        Ok(dir.join(format!("{}.asm", name)))
    } else {
        Ok(input.with_extension("asm"))
    }
}

/// Scratch file next to `output`, so a failed run never leaves a partial
/// program at `output` itself.
fn temp_beside(output: &Path) -> Result<NamedTempFile> {
    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir).with_context(|| format!("can't create a file in {}", dir.display()))
}

fn persist(file: NamedTempFile, output: &Path) -> Result<()> {
    file.persist(output)
        .with_context(|| format!("can't write {}", output.display()))?;
    info!("wrote {}", output.display());
    Ok(())
}

fn translate_file(translator: &mut Translator<NamedTempFile>, unit: &Unit) -> Result<()> {
    info!("translating {}", unit.path.display());
    let file = File::open(&unit.path).with_context(|| format!("can't open {}", unit.path.display()))?;
    let count = translate_unit(translator, BufReader::new(file))
        .with_context(|| format!("in {}", unit.path.display()))?;
    debug!("{}: {} commands", unit.name, count);
    Ok(())
}

fn translate_single(cli: &Cli, units: &[Unit]) -> Result<()> {
    let output = match &cli.output {
        Some(path) => path.clone(),
        None => default_output(&cli.input)?,
    };

    let mut translator = Translator::new(temp_beside(&output)?, &units[0].name).with_comments(cli.comments);
    if cli.bootstrap {
        translator.write_bootstrap()?;
    }
    for unit in units {
        translator.set_output_unit(&unit.name);
        translate_file(&mut translator, unit)?;
    }

    persist(translator.close()?, &output)
}

fn translate_split(cli: &Cli, units: &[Unit]) -> Result<()> {
    let outputs: Vec<PathBuf> = units.iter().map(|u| u.path.with_extension("asm")).collect();

    let mut translator = Translator::new(temp_beside(&outputs[0])?, &units[0].name).with_comments(cli.comments);
    translate_file(&mut translator, &units[0])?;
    for (i, unit) in units.iter().enumerate().skip(1) {
        let done = translator.rebind(temp_beside(&outputs[i])?, &unit.name)?;
        persist(done, &outputs[i - 1])?;
        translate_file(&mut translator, unit)?;
    }

    persist(translator.close()?, &outputs[outputs.len() - 1])
}
