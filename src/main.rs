use clap::{Parser, ValueEnum};
use mdxclude::{
    CommentTracker, FenceTracker, HeadingSelector, Result, StreamTransclusion, TranscludeError,
    TranscludeOptions, TranscludeOutput, find_references_tracked, transclude_file,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const LONG_HELP: &str = r#"
Reference:
  ![[other.md]]            - Include other.md in place of the marker
  ![[other]]               - Same; .md/.markdown extensions are probed
  ![[other#Heading]]       - Include one heading's section
  ![[other#Start:End]]     - Include the range from Start up to End
  ![[other#Start:]]        - From Start to the end of the document
  ![[other#:End]]          - From the document start up to End
  ![[{{lang}}/intro]]      - Variables expand inside reference paths

Examples:
  # Expand a document
  mdxclude book.md
  # Process from stdin, streaming
  cat book.md | mdxclude -
  # Check references without producing output
  mdxclude book.md --validate-only
  # List all references in a document
  mdxclude book.md --list
  # List with resolution details, or as JSON for scripting
  mdxclude book.md --list=detailed
  mdxclude book.md --list=json
  # Substitute variables in reference paths
  mdxclude book.md --variables lang=en --variables version=2
  # Strip YAML/TOML front matter from included files
  mdxclude book.md --strip-frontmatter
  # Save output to a file
  mdxclude book.md -o book-expanded.md
"#;

/// Recursive markdown transclusion.
#[derive(Parser, Debug)]
#[command(
    name = "mdxclude",
    version,
    about = "Expand ![[...]] transclusion references in markdown documents.",
    after_long_help = LONG_HELP
)]
struct Cli {
    /// Input file to process. Use '-' for stdin (streaming mode).
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Base directory for resolving references; also the security boundary
    #[arg(short, long, value_name = "DIR", env = "MDXCLUDE_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Maximum transclusion depth
    #[arg(short = 'd', long, value_name = "DEPTH", default_value = "10")]
    max_depth: usize,

    /// Variable substitutions for reference paths (repeatable)
    #[arg(long = "variables", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
    variables: Vec<String>,

    /// Treat any reference failure as a failure of the whole run
    #[arg(long)]
    strict: bool,

    /// Validate all references without emitting content
    #[arg(long, conflicts_with = "list")]
    validate_only: bool,

    /// Strip leading YAML/TOML front matter blocks
    #[arg(long)]
    strip_frontmatter: bool,

    /// List references in the input (optionally with format: plain, detailed, json)
    #[arg(long, value_name = "FORMAT", num_args = 0..=1, default_missing_value = "plain", conflicts_with = "validate_only")]
    list: Option<ListFormat>,

    /// Format for the accumulated error report on stderr
    #[arg(long, value_enum, default_value = "plain", value_name = "FORMAT")]
    errors: ErrorFormat,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ErrorFormat {
    /// One human-readable line per error
    Plain,
    /// JSON array of structured errors
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum ListFormat {
    /// Simple list of reference paths
    Plain,
    /// Detailed information about each reference
    Detailed,
    /// JSON output for scripting
    Json,
}

#[derive(Serialize, Deserialize)]
struct ReferenceInfo {
    path: String,
    line: usize,
    start: usize,
    end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    heading: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => LogLevel::Error,
        (false, 0) => LogLevel::Warn,
        (false, 1) => LogLevel::Info,
        (false, 2) => LogLevel::Debug,
        (false, _) => LogLevel::Trace,
    };

    let options = match build_options(&cli) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let result = if let Some(format) = cli.list {
        list_references(&cli, format, log_level)
    } else if cli.input.as_path() == Path::new("-") {
        run_streaming(&cli, &options, log_level)
    } else {
        run_file(&cli, &options, log_level)
    };

    match result {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn build_options(cli: &Cli) -> Result<TranscludeOptions> {
    let mut variables = HashMap::new();
    for pair in &cli.variables {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(TranscludeError::Resolve {
                reference: pair.clone(),
                message: "expected KEY=VALUE".to_string(),
            });
        };
        variables.insert(key.trim().to_string(), value.to_string());
    }

    let mut options = TranscludeOptions {
        variables,
        strict: cli.strict,
        max_depth: cli.max_depth,
        validate_only: cli.validate_only,
        strip_frontmatter: cli.strip_frontmatter,
        ..TranscludeOptions::default()
    };
    if let Some(dir) = &cli.base_dir {
        options.base_path = dir.clone();
    }
    Ok(options)
}

fn run_file(cli: &Cli, options: &TranscludeOptions, log_level: LogLevel) -> Result<i32> {
    log(
        log_level,
        LogLevel::Info,
        &format!("Processing {}", cli.input.display()),
    );

    let output = transclude_file(&cli.input, options)?;
    for path in &output.processed_files {
        log(
            log_level,
            LogLevel::Debug,
            &format!("Processed {}", path.display()),
        );
    }

    if !options.validate_only {
        write_content(cli, &output.content)?;
    }
    report(cli, &output, log_level)
}

fn run_streaming(cli: &Cli, options: &TranscludeOptions, log_level: LogLevel) -> Result<i32> {
    log(log_level, LogLevel::Info, "Streaming from stdin...");

    let stdin = io::stdin();
    let output = if let Some(path) = &cli.output {
        let file = std::fs::File::create(path)?;
        drive_stream(stdin.lock(), file, options, log_level)?
    } else {
        let stdout = io::stdout();
        drive_stream(stdin.lock(), stdout.lock(), options, log_level)?
    };

    report(cli, &output, log_level)
}

fn drive_stream<R: io::Read, W: Write>(
    mut reader: R,
    writer: W,
    options: &TranscludeOptions,
    log_level: LogLevel,
) -> Result<TranscludeOutput> {
    let mut stream = StreamTransclusion::new(options, writer).on_file_processed(|path| {
        log(
            log_level,
            LogLevel::Debug,
            &format!("Processed {}", path.display()),
        );
    });

    let mut chunk = [0u8; 8 * 1024];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        stream.write_chunk(&chunk[..n])?;
    }
    stream.finish()
}

fn write_content(cli: &Cli, content: &str) -> Result<()> {
    if let Some(path) = &cli.output {
        std::fs::write(path, content)?;
    } else {
        print!("{content}");
        io::stdout().flush()?;
    }
    Ok(())
}

/// Prints the error report and decides the exit code: 1 under
/// `--validate-only` or `--strict` when any reference failed, 0 otherwise.
fn report(cli: &Cli, output: &TranscludeOutput, log_level: LogLevel) -> Result<i32> {
    if output.errors.is_empty() {
        if cli.validate_only {
            println!(
                "Summary: {} files processed, all references valid",
                output.processed_files.len()
            );
        }
        return Ok(0);
    }

    match cli.errors {
        ErrorFormat::Plain => {
            for error in &output.errors {
                let location = error
                    .line
                    .map(|line| format!(" (line {line})"))
                    .unwrap_or_default();
                eprintln!("[{:?}] {}{}", error.code, error.message, location);
            }
        }
        ErrorFormat::Json => {
            eprintln!("{}", serde_json::to_string_pretty(&output.errors)?);
        }
    }

    if cli.validate_only {
        println!(
            "Summary: {} files processed, {} invalid references",
            output.processed_files.len(),
            output.errors.len()
        );
    }

    log(
        log_level,
        LogLevel::Warn,
        &format!("{} reference(s) failed", output.errors.len()),
    );

    Ok(if cli.strict || cli.validate_only { 1 } else { 0 })
}

fn list_references(cli: &Cli, format: ListFormat, log_level: LogLevel) -> Result<i32> {
    log(log_level, LogLevel::Debug, "Listing references...");

    let content = if cli.input.as_path() == Path::new("-") {
        io::read_to_string(io::stdin())?
    } else {
        std::fs::read_to_string(&cli.input)?
    };

    let mut infos = Vec::new();
    let mut fence = FenceTracker::new();
    let mut comments = CommentTracker::new();
    for (index, line) in content.lines().enumerate() {
        if fence.observe(line) {
            continue;
        }
        for token in find_references_tracked(line, &mut comments) {
            infos.push(ReferenceInfo {
                path: token.path.clone(),
                line: index + 1,
                start: token.start,
                end: token.end,
                heading: token.heading.as_ref().map(heading_display),
            });
        }
    }

    match format {
        ListFormat::Plain => {
            for info in &infos {
                println!("{}", info.path);
            }
        }
        ListFormat::Detailed => {
            for info in &infos {
                println!("Reference: {}", info.path);
                println!("  Line: {}", info.line);
                println!("  Position: {}..{}", info.start, info.end);
                if let Some(heading) = &info.heading {
                    println!("  Heading: {heading}");
                }
                println!();
            }
        }
        ListFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&infos)?);
        }
    }

    Ok(0)
}

fn heading_display(selector: &HeadingSelector) -> String {
    match selector {
        HeadingSelector::Section(name) => name.clone(),
        HeadingSelector::Range { start, end } => format!(
            "{}:{}",
            start.as_deref().unwrap_or_default(),
            end.as_deref().unwrap_or_default()
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

fn log(current_level: LogLevel, message_level: LogLevel, message: &str) {
    if message_level >= current_level {
        eprintln!(
            "[{}] {}",
            match message_level {
                LogLevel::Trace => "TRACE",
                LogLevel::Debug => "DEBUG",
                LogLevel::Info => "INFO",
                LogLevel::Warn => "WARN",
                LogLevel::Error => "ERROR",
            },
            message
        );
    }
}
