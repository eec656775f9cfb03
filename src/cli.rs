// Command-line front end for sdat2img.
//
// `sdat2img [OPTIONS] <TRANSFER_LIST> <NEW_DATA> [OUTPUT]`
//
// Errors from the library are reported here and only here: one line on
// stderr, exit status 1.

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, ValueHint};
use log::LevelFilter;

use crate::io::{self, ConvertStats};

/// Output image name used when none is given.
const DEFAULT_OUTPUT: &str = "system.img";

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Rebuild a raw image from a transfer list and its new-data blob.
#[derive(Parser, Debug)]
#[command(
    name = "sdat2img",
    version,
    about = "Convert sparse Android data images (.dat) to raw filesystem images",
    arg_required_else_help = true
)]
struct Cli {
    /// Transfer list file (e.g. system.transfer.list).
    #[arg(value_hint = ValueHint::FilePath)]
    transfer_list: PathBuf,

    /// New data file (e.g. system.new.dat).
    #[arg(value_hint = ValueHint::FilePath)]
    new_data: PathBuf,

    /// Output image; must not exist yet.
    #[arg(value_hint = ValueHint::FilePath, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Validate inputs only (do not write output).
    #[arg(long = "check-only")]
    check_only: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json")]
    json_output: bool,
}

// ---------------------------------------------------------------------------
// Resolved options
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Options {
    transfer_list: PathBuf,
    new_data: PathBuf,
    output: PathBuf,
    check_only: bool,
    log_level: LevelFilter,
    json_output: bool,
}

fn resolve_options(cli: Cli) -> Options {
    let log_level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Options {
        transfer_list: cli.transfer_list,
        new_data: cli.new_data,
        output: cli.output,
        check_only: cli.check_only,
        log_level,
        json_output: cli.json_output,
    }
}

impl Options {
    /// Name reported in the JSON stats.
    fn command(&self) -> &'static str {
        if self.check_only { "check" } else { "convert" }
    }
}

/// Parse `args` (without argv[0]) and, when they are accepted, render the
/// JSON stats document the resolved options would produce.
#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) -> Option<serde_json::Value> {
    let argv: Vec<String> = std::iter::once("sdat2img".to_string())
        .chain(args.iter().cloned())
        .collect();
    let opts = resolve_options(Cli::try_parse_from(argv).ok()?);
    let json = stats_json(opts.command(), &opts, &ConvertStats::default());
    assert_eq!(json["output"].is_null(), opts.check_only);
    Some(json)
}

// ---------------------------------------------------------------------------
// Stats output
// ---------------------------------------------------------------------------

fn stats_json(command: &str, opts: &Options, stats: &ConvertStats) -> serde_json::Value {
    serde_json::json!({
        "command": command,
        "transfer_list": opts.transfer_list.display().to_string(),
        "new_data": opts.new_data.display().to_string(),
        "output": (!opts.check_only).then(|| opts.output.display().to_string()),
        "version": stats.version,
        "declared_total_blocks": stats.declared_total_blocks,
        "blob_size": stats.blob_size,
        "new_blocks": stats.new_blocks,
        "ranges_copied": stats.ranges_copied,
        "skipped_commands": stats.skipped_commands,
        "image_size": stats.image_size,
    })
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

fn execute(opts: &Options) -> i32 {
    let result = if opts.check_only {
        io::check_files(&opts.transfer_list, &opts.new_data)
    } else {
        io::convert_files(&opts.transfer_list, &opts.new_data, &opts.output)
    };

    match result {
        Ok(stats) => {
            if opts.json_output {
                eprintln!("{:#}", stats_json(opts.command(), opts, &stats));
            }
            0
        }
        Err(e) => {
            eprintln!("sdat2img: {e}");
            1
        }
    }
}

pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(opts.log_level.as_str()),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    process::exit(execute(&opts));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
