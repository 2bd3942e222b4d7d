use anyhow::{Context, Result, bail, format_err};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use indoc::indoc;
use log::{LevelFilter, info};
use serde::Serialize;

use sardemo::utils::format_ticks;
use sardemo::{
    DemoHeader, DemoParser, ParseResult, ParserSettings, ReportLine, ReportOutput, SarData,
    TextOutput, V2SumState, Validator, Whitelist,
};

#[cfg(feature = "multithreading")]
use rayon::prelude::*;

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

struct DemoVerify {
    parser: DemoParser,
    whitelist: Whitelist,
    inputs: Vec<String>,
    output_format: OutputFormat,
    output_target: Option<PathBuf>,
    confirm_overwrite: bool,
    verbosity_level: Option<LevelFilter>,
}

/// One document per input in `--format json` mode.
#[derive(Serialize)]
struct JsonReport<'a> {
    input: &'a str,
    header: &'a DemoHeader,
    messages: &'a [SarData],
    checksum: Option<u32>,
    signature: V2SumState,
    report: Vec<ReportLine>,
}

impl DemoVerify {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let inputs: Vec<String> = matches
            .get_many::<String>("INPUT")
            .ok_or_else(|| format_err!("At least one input is required"))?
            .cloned()
            .collect();

        let output_format = match matches
            .get_one::<String>("output-format")
            .map(String::as_str)
        {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Text,
        };

        let whitelist = match matches.get_one::<PathBuf>("whitelist") {
            Some(dir) => load_whitelist(dir)?,
            None => Whitelist::new(),
        };

        let max_size = match matches.get_one::<usize>("max-size").copied() {
            Some(0) => None,
            Some(limit) => Some(limit),
            None => ParserSettings::default().get_max_size(),
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(LevelFilter::Info),
            2 => Some(LevelFilter::Debug),
            3 => Some(LevelFilter::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(LevelFilter::Trace)
            }
        };

        Ok(DemoVerify {
            parser: DemoParser::new()
                .with_configuration(ParserSettings::new().max_size(max_size)),
            whitelist,
            inputs,
            output_format,
            output_target: matches.get_one::<PathBuf>("output-target").cloned(),
            confirm_overwrite: !matches.get_flag("no-confirm-overwrite"),
            verbosity_level,
        })
    }

    /// Returns `false` if any input failed to read or parse.
    pub fn run(&self) -> Result<bool> {
        self.try_to_initialize_logging();

        let mut output: Box<dyn Write> = match &self.output_target {
            Some(path) => Box::new(
                create_output_file(path, self.confirm_overwrite).with_context(|| {
                    format!("An error occurred while creating output file at `{}`", path.display())
                })?,
            ),
            None => Box::new(io::stdout()),
        };

        let mut all_ok = true;
        let mut demos = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            match read_input(input) {
                Ok(raw) => demos.push((input.as_str(), raw)),
                Err(e) => {
                    eprintln!("{e:?}");
                    all_ok = false;
                }
            }
        }

        #[cfg(feature = "multithreading")]
        let rendered: Vec<Result<String>> = demos
            .par_iter()
            .map(|(name, raw)| self.render(name, raw))
            .collect();

        #[cfg(not(feature = "multithreading"))]
        let rendered: Vec<Result<String>> = demos
            .iter()
            .map(|(name, raw)| self.render(name, raw))
            .collect();

        for report in rendered {
            match report {
                Ok(text) => output
                    .write_all(text.as_bytes())
                    .context("Failed to write report")?,
                Err(e) => {
                    eprintln!("{e:?}");
                    all_ok = false;
                }
            }
        }

        output.flush().context("Failed to flush output")?;
        Ok(all_ok)
    }

    fn render(&self, name: &str, raw: &[u8]) -> Result<String> {
        let result = self
            .parser
            .parse(raw)
            .with_context(|| format!("Failed to parse demo `{name}`"))?;

        let mut validator = Validator::new(&self.whitelist);
        let rendered = match self.output_format {
            OutputFormat::Text => {
                let mut output = TextOutput::with_writer(Vec::new());
                for line in header_lines(name, &result.demo.header) {
                    output.emit(line);
                }
                validator.validate(&result, &mut output);
                String::from_utf8_lossy(&output.finish()?).into_owned()
            }
            OutputFormat::Json => {
                let mut report: Vec<ReportLine> = Vec::new();
                validator.validate(&result, &mut report);
                let mut text = serde_json::to_string_pretty(&json_report(name, &result, report))?;
                text.push('\n');
                text
            }
        };

        info!(
            "`{name}`: {} timescale changes",
            validator.timescale_changes()
        );
        Ok(rendered)
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) =
                simplelog::WriteLogger::init(level, simplelog::Config::default(), io::stderr())
            {
                eprintln!("Failed to initialize logging: {e}");
            }
        }
    }
}

fn header_lines(name: &str, header: &DemoHeader) -> Vec<ReportLine> {
    let ticks = u64::try_from(header.playback_ticks).unwrap_or_default();
    vec![
        ReportLine::new("Demo", name),
        ReportLine::new("Map", header.map_name.as_str()),
        ReportLine::new("Player", header.client_name.as_str()),
        ReportLine::new("Ticks", header.playback_ticks.to_string()),
        ReportLine::new("Time", format_ticks(ticks)),
    ]
}

fn json_report<'a>(
    name: &'a str,
    result: &'a ParseResult<'_>,
    report: Vec<ReportLine>,
) -> JsonReport<'a> {
    JsonReport {
        input: name,
        header: &result.demo.header,
        messages: &result.messages,
        checksum: result.checksum,
        signature: result.v2sum_state,
        report,
    }
}

/// `-` reads the demo from stdin.
fn read_input(input: &str) -> Result<Vec<u8>> {
    if input == "-" {
        let mut raw = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut raw)
            .context("Failed to read demo from stdin")?;
        return Ok(raw);
    }

    fs::read(input).with_context(|| format!("Failed to open file {input}"))
}

/// Reads the whitelist rule files from `dir`. A missing file is an empty rule list.
fn load_whitelist(dir: &Path) -> Result<Whitelist> {
    if !dir.is_dir() {
        bail!("Whitelist directory {} does not exist", dir.display());
    }

    let read = |name: &str| -> Result<String> {
        let path = dir.join(name);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No {} in whitelist directory, using no rules", name);
                Ok(String::new())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    };

    Ok(Whitelist::from_sources(
        &read("checksums.txt")?,
        &read("commands.txt")?,
        &read("cvars.txt")?,
        &read("files.txt")?,
    ))
}

/// If `prompt` is passed, will display a confirmation prompt before overwriting files.
fn create_output_file(path: &Path, prompt: bool) -> Result<File> {
    if path.is_dir() {
        bail!(
            "There is a directory at {}, refusing to overwrite",
            path.display()
        );
    }

    if path.exists() {
        if prompt {
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Are you sure you want to override output file at {}",
                    path.display()
                ))
                .default(false)
                .interact()
                .context("Failed to write confirmation prompt to term")?;

            if !confirmed {
                bail!("Cancelled");
            }
        }
        return Ok(File::create(path)?);
    }

    match path.parent() {
        Some(parent) => {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
            Ok(File::create(path)?)
        }
        None => bail!("Output file cannot be root."),
    }
}

fn command() -> Command {
    Command::new("demo_verify")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Verify SAR demo checksums and report SAR data against a whitelist")
        .long_about(indoc!(
            r#"
            Verify SAR demo checksums and report SAR data against a whitelist.

            Every input is parsed, its checksum is verified, and each console command,
            cvar and file checksum SAR recorded is checked against the whitelist rules.
            Lines that fail a check are marked `(INVALID)`.
        "#
        ))
        .arg(
            Arg::new("INPUT")
                .required(true)
                .num_args(1..)
                .action(ArgAction::Append)
                .help("Demo files to verify. Pass `-` to read a demo from stdin."),
        )
        .arg(
            Arg::new("whitelist")
                .long("whitelist")
                .short('w')
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf))
                .help(
                    "Directory holding checksums.txt, commands.txt, cvars.txt and files.txt. \
                     Without it every checksum, command and file is reported invalid.",
                ),
        )
        .arg(
            Arg::new("output-format")
                .long("format")
                .short('o')
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Sets the output format")
                .long_help(indoc!(
                    r#"
                    Sets the output format:
                        "text" - prints demo info followed by one report line per check.
                        "json" - prints one JSON document per demo, with the decoded SAR data.
                "#
                )),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help(
                    "Writes output to the file specified instead of stdout, errors will still be printed to stderr. \
                     Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`. \
                     Will create parent directories if needed.",
                ),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("max-size")
                .long("max-size")
                .value_name("BYTES")
                .value_parser(clap::value_parser!(usize))
                .help("Rejects demos larger than this many bytes, 0 disables the limit (default: 6 MiB)."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace"),
        )
}

fn main() {
    let matches = command().get_matches();

    let app = match DemoVerify::from_cli_matches(&matches) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{e:?}");
            exit(1)
        }
    };

    match app.run() {
        Ok(true) => {}
        Ok(false) => exit(1),
        Err(e) => {
            eprintln!("{e:?}");
            exit(1)
        }
    }
}
