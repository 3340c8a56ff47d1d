use arbora::export::{ExportError, ExportFormat, ExportRequest, export_document};
use arbora::render::{HeadlessError, LayoutOptions, LayoutSettings, layout_text_sync};
use arbora::{ParserKind, RenderConfig};
use serde::Serialize;
use std::io::{Read, Write};
use std::path::PathBuf;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Headless(HeadlessError),
    Export(ExportError),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Headless(err) => write!(f, "{err}"),
            CliError::Export(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<HeadlessError> for CliError {
    fn from(value: HeadlessError) -> Self {
        Self::Headless(value)
    }
}

impl From<ExportError> for CliError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Parse,
    Layout,
    Render,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    kind: ParserKind,
    input: Option<String>,
    config: Option<String>,
    pretty: bool,
    verbose: bool,
    settings: LayoutSettings,
    zoom: Option<f64>,
    format: ExportFormat,
    name: Option<String>,
    out: Option<String>,
}

fn usage() -> &'static str {
    "arbora\n\
\n\
USAGE:\n\
  arbora [parse] [--kind <kind>] [--tab-width <n>] [--pretty] [<path>|-]\n\
  arbora layout [--kind <kind>] [--config <json>] [--single-char] [--avoid-crossing] [--tab-width <n>] [--padding <px>] [--pretty] [<path>|-]\n\
  arbora render [--kind <kind>] [--config <json>] [--format svg|png] [--zoom <z>] [--name <file-name>] [--out <path>] [layout flags] [<path>|-]\n\
\n\
KINDS:\n\
  hierarchy (default), mind, entity-relation, flow\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - --config reads a render config JSON file (camelCase keys, missing keys use defaults).\n\
  - render prints SVG to stdout by default; use --out to write a file.\n\
  - --name writes <name>.<format> into the current directory.\n\
  - PNG output defaults to writing next to the input file (or ./out.png for stdin).\n\
  - --verbose logs pipeline steps to stderr.\n\
"
}

fn next_value<'a>(it: &mut impl Iterator<Item = &'a String>) -> Result<&'a String, CliError> {
    it.next().ok_or(CliError::Usage(usage()))
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "parse" => args.command = Command::Parse,
            "layout" => args.command = Command::Layout,
            "render" => args.command = Command::Render,
            "--pretty" => args.pretty = true,
            "--verbose" | "-v" => args.verbose = true,
            "--single-char" => args.settings.single_char_per_line = true,
            "--avoid-crossing" => args.settings.avoid_crossing = true,
            "--kind" => {
                args.kind = next_value(&mut it)?
                    .parse::<ParserKind>()
                    .map_err(|_| CliError::Usage(usage()))?;
            }
            "--config" => args.config = Some(next_value(&mut it)?.clone()),
            "--tab-width" => {
                let width = next_value(&mut it)?
                    .parse::<usize>()
                    .map_err(|_| CliError::Usage(usage()))?;
                if width == 0 {
                    return Err(CliError::Usage(usage()));
                }
                args.settings.tab_width = width;
            }
            "--padding" => {
                args.settings.padding = next_value(&mut it)?
                    .parse::<f64>()
                    .map_err(|_| CliError::Usage(usage()))?;
            }
            "--zoom" => {
                let zoom = next_value(&mut it)?
                    .parse::<f64>()
                    .map_err(|_| CliError::Usage(usage()))?;
                if !(zoom.is_finite() && zoom > 0.0) {
                    return Err(CliError::Usage(usage()));
                }
                args.zoom = Some(zoom);
            }
            "--format" => {
                args.format = next_value(&mut it)?
                    .parse::<ExportFormat>()
                    .map_err(|_| CliError::Usage(usage()))?;
            }
            "--name" => args.name = Some(next_value(&mut it)?.clone()),
            "--out" => args.out = Some(next_value(&mut it)?.clone()),
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(CliError::Usage(usage()));
            }
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn read_config(path: Option<&str>) -> Result<RenderConfig, CliError> {
    let Some(path) = path else {
        return Ok(RenderConfig::default());
    };
    let text = std::fs::read_to_string(path)?;
    let config: RenderConfig = serde_json::from_str(&text)?;
    Ok(config.sanitized())
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    if pretty {
        serde_json::to_writer_pretty(&mut stdout, value)?;
    } else {
        serde_json::to_writer(&mut stdout, value)?;
    }
    writeln!(stdout)?;
    Ok(())
}

fn default_raster_out_path(input: Option<&str>, ext: &str) -> PathBuf {
    match input {
        Some(path) if path != "-" => PathBuf::from(path).with_extension(ext),
        _ => PathBuf::from(format!("out.{ext}")),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<(), CliError> {
    let text = read_input(args.input.as_deref())?;
    let mut config = read_config(args.config.as_deref())?;
    if let Some(zoom) = args.zoom {
        config = config.with_zoom(zoom).sanitized();
    }
    let options = LayoutOptions::from_render_config(&config).with_settings(args.settings.clone());

    match args.command {
        Command::Parse => {
            let parsed = arbora::parse(args.kind, &text, &options.indent_options());
            if parsed.is_empty() {
                tracing::warn!(kind = %parsed.kind(), "input produced an empty diagram");
            }
            tracing::debug!(kind = %parsed.kind(), "parsed input");
            write_json(&parsed, args.pretty)
        }
        Command::Layout => {
            let document = layout_text_sync(args.kind, &text, &options)?;
            write_json(&document, args.pretty)
        }
        Command::Render => {
            let document = layout_text_sync(args.kind, &text, &options)?;
            let file_name = args.name.clone().unwrap_or_else(|| {
                args.input
                    .as_deref()
                    .filter(|p| *p != "-")
                    .and_then(|p| PathBuf::from(p).file_stem()?.to_str().map(str::to_string))
                    .unwrap_or_default()
            });
            let artifact = export_document(&ExportRequest {
                document,
                format: args.format,
                file_name,
                config,
            })?;

            if let Some(out) = args.out.as_deref() {
                if out == "-" {
                    std::io::stdout().lock().write_all(&artifact.bytes)?;
                } else {
                    std::fs::write(out, &artifact.bytes)?;
                }
                return Ok(());
            }
            if args.name.is_some() {
                let cwd = std::env::current_dir()?;
                artifact.save_in(&cwd)?;
                return Ok(());
            }
            match args.format {
                ExportFormat::Svg => std::io::stdout().lock().write_all(&artifact.bytes)?,
                ExportFormat::Png => {
                    let out = default_raster_out_path(args.input.as_deref(), "png");
                    std::fs::write(&out, &artifact.bytes)?;
                    tracing::debug!(path = %out.display(), "wrote png");
                }
            }
            Ok(())
        }
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_tracing(args.verbose);

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
