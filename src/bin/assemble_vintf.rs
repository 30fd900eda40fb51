use anyhow::{Result, format_err};
use clap::{Arg, ArgAction, ArgMatches, Command};
use indoc::indoc;
use log::{LevelFilter, debug, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use vintf::{Assembler, EnvFlags};

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

const USAGE: &str = indoc!(
    "
    assemble_vintf -h
                   Display this help text.
    assemble_vintf -i <input file> [-o <output file>]
                   Fill in build-time flags into the given manifest.
                   If no designated output file, write to stdout.
    "
);

fn help() {
    eprint!("{}", USAGE);
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    File(PathBuf),
}

struct AssembleVintf {
    input: InputSource,
    output: Option<PathBuf>,
    verbosity_level: Option<LevelFilter>,
}

impl AssembleVintf {
    /// Returns `None` when only the usage should be printed.
    fn from_cli_matches(matches: &ArgMatches) -> Option<Self> {
        if matches.get_flag("help") {
            return None;
        }

        let input = match matches.get_one::<String>("input") {
            Some(path) if path == "-" => InputSource::Stdin,
            Some(path) => InputSource::File(PathBuf::from(path)),
            None => {
                eprintln!("Missing input file");
                return None;
            }
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(LevelFilter::Info),
            2 => Some(LevelFilter::Debug),
            _ => Some(LevelFilter::Trace),
        };

        Some(AssembleVintf {
            input,
            output: matches.get_one::<String>("output").map(PathBuf::from),
            verbosity_level,
        })
    }

    /// Main entry point for `AssembleVintf`.
    fn run(&self) -> Result<()> {
        self.try_to_initialize_logging();

        // Both ends are opened before anything is parsed.
        let input = self.open_input()?;
        self.check_output_is_not_input()?;
        let output = self.open_output()?;

        Assembler::new().assemble(input, output, &EnvFlags)?;

        info!("manifest assembled");
        Ok(())
    }

    fn open_input(&self) -> Result<Box<dyn Read>> {
        match &self.input {
            InputSource::Stdin => Ok(Box::new(io::stdin().lock())),
            InputSource::File(path) => {
                debug!("reading manifest from {}", path.display());
                let file = File::open(path)
                    .map_err(|e| format_err!("Failed to open {}: {}", path.display(), e))?;
                Ok(Box::new(file))
            }
        }
    }

    /// Creating the output truncates it, which would destroy an input that has not been read yet.
    fn check_output_is_not_input(&self) -> Result<()> {
        let (InputSource::File(input), Some(output)) = (&self.input, &self.output) else {
            return Ok(());
        };

        // An output that does not exist yet cannot be the input.
        match (input.canonicalize(), output.canonicalize()) {
            (Ok(a), Ok(b)) if a == b => Err(format_err!(
                "Input file {} is also the output file, refusing to overwrite it",
                input.display()
            )),
            _ => Ok(()),
        }
    }

    fn open_output(&self) -> Result<Box<dyn Write>> {
        match &self.output {
            Some(path) => {
                debug!("writing manifest to {}", path.display());
                let file = Self::create_output_file(path)
                    .map_err(|e| format_err!("Failed to open {}: {}", path.display(), e))?;
                Ok(Box::new(BufWriter::new(file)))
            }
            None => Ok(Box::new(io::stdout().lock())),
        }
    }

    /// Creates (or truncates) the output file, creating missing parent directories.
    fn create_output_file(path: &Path) -> Result<File> {
        if path.is_dir() {
            return Err(format_err!(
                "There is a directory at {}, refusing to overwrite",
                path.display()
            ));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(File::create(path)?)
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level,
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {}", e);
            }
        }
    }
}

fn command() -> Command {
    Command::new("assemble_vintf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fill in build-time flags into a HAL manifest")
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("help")
                .short('h')
                .long("help")
                .action(ArgAction::SetTrue)
                .help("Display this help text."),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .action(ArgAction::Set)
                .overrides_with("input")
                .value_name("INPUT FILE")
                .help("Manifest template to read, `-` for stdin."),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .action(ArgAction::Set)
                .overrides_with("output")
                .value_name("OUTPUT FILE")
                .help("Where to write the assembled manifest, defaults to stdout. Parent directories are created if needed."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace. Logs are written to stderr."),
        )
}

fn main() {
    let matches = match command().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            eprintln!("{}", e.kind());
            help();
            exit(1)
        }
    };

    let app = match AssembleVintf::from_cli_matches(&matches) {
        Some(app) => app,
        None => {
            help();
            exit(1)
        }
    };

    if let Err(e) = app.run() {
        eprintln!("{}", e);
        exit(1);
    }
}
