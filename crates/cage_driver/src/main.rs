//! `cage`: move the namespaces of a PHP code base under a prefix.

mod load;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context as _, Result, bail};
use ariadne::{Color, Label, Report, ReportKind, Source};
use cage_ast::{UnitRole, Units};
use cage_context::{Context, ContextBuilder, NamespaceTransform, QName, Transform, TransformList};
use cage_parser::{ParseError, Parser as PhpParser};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use load::{LoadError, Loader, SourceFile};

#[derive(Parser)]
#[command(name = "cage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Prefixes the namespaces of PHP declarations and every reference to them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Prefix the namespaces declared in a source directory
    Prefix(PrefixArgs),

    /// Show the namespaces and symbols declared in a source directory
    Tree {
        /// The directory to read declarations from
        #[arg(value_name = "SRC")]
        src: PathBuf,

        /// Additional directories to read references from
        #[arg(short, long, value_name = "DIR")]
        include: Vec<PathBuf>,

        /// Maximum directory recursion depth
        #[arg(short, long, default_value_t = 5)]
        depth: usize,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show parser output for a single file
    Parse {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
struct PrefixArgs {
    /// The directory to read declarations from
    #[arg(value_name = "SRC")]
    src: PathBuf,

    /// The namespace prefix [default: Cage followed by a unique suffix]
    #[arg(short, long)]
    prefix: Option<String>,

    /// The output directory
    #[arg(short, long, default_value = "cage-output")]
    output: PathBuf,

    /// Additional directories to rewrite, without collecting their declarations
    #[arg(short, long, value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Maximum directory recursion depth
    #[arg(short, long, default_value_t = 5)]
    depth: usize,

    /// Rewrite the files in place
    #[arg(short, long)]
    replace: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Prefix(args) => run_prefix(&args),
        Commands::Tree {
            src,
            include,
            depth,
            json,
        } => run_tree(&src, &include, depth, json),
        Commands::Parse { file } => run_parse(&file),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "cage", &mut io::stdout());
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// `Cage` followed by the current time in hex, unique per run
fn default_prefix() -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros())
        .unwrap_or_default();
    format!("Cage{:x}", micros)
}

fn run_prefix(args: &PrefixArgs) -> Result<()> {
    let prefix = QName::parse(&args.prefix.clone().unwrap_or_else(default_prefix));
    if prefix.is_empty() {
        bail!("the namespace prefix must not be empty");
    }

    let (mut units, files) = load(&args.src, &args.include, args.depth)?;
    let ctx = collect(&units);

    println!("=> Compiling namespaces ...");
    let transforms = namespace_transforms(&ctx, &prefix);
    info!(count = transforms.len(), "namespace transforms");

    println!("=> Applying transformation ...");
    transforms
        .apply(&ctx, &mut units)
        .context("failed to rewrite namespaces")?;

    if args.replace {
        println!("=> Rewriting files in place ...");
    } else {
        println!("=> Printing code to {} ...", args.output.display());
    }
    write_units(&units, &files, &args.output, args.replace)
}

fn run_tree(src: &Path, include: &[PathBuf], depth: usize, json: bool) -> Result<()> {
    let (units, _) = load(src, include, depth)?;
    let tree = collect(&units).tree();

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print!("{}", tree.render());
    }
    Ok(())
}

fn run_parse(file: &Path) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    match PhpParser::parse(&text) {
        Ok(tree) => {
            println!("=== Parser Output for {} ===\n", file.display());
            print!("{}", tree.pretty_print());
            Ok(())
        }
        Err(error) => {
            report_parse_error(file, &text, &error);
            bail!("failed to parse {}", file.display())
        }
    }
}

/// Parse `src` as sources and every include directory as reference-only units
fn load(src: &Path, include: &[PathBuf], depth: usize) -> Result<(Units, Vec<SourceFile>)> {
    let mut loader = Loader::new(depth);

    let dirs = std::iter::once((src, UnitRole::Source))
        .chain(include.iter().map(|dir| (dir.as_path(), UnitRole::Include)));
    for (dir, role) in dirs {
        println!("=> Scanning {} ...", dir.display());
        match loader.load_dir(dir, role) {
            Ok(count) => info!(dir = %dir.display(), count, "scanned"),
            Err(LoadError::Parse { path, text, error }) => {
                report_parse_error(&path, &text, &error);
                bail!("failed to parse {}", path.display());
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(loader.finish())
}

/// All declaration passes, then all reference passes
fn collect(units: &Units) -> Context {
    let mut builder = ContextBuilder::new();
    builder.build_units(units);
    builder.finish()
}

/// One rename per top-level namespace; the global namespace is left alone
fn namespace_transforms(ctx: &Context, prefix: &QName) -> TransformList {
    let mut transforms = TransformList::new();
    for root in ctx.tree().roots() {
        let search = QName::parse(root);
        let replace = QName::merge(prefix, &search);
        debug!(from = %search, to = %replace, "namespace transform");
        transforms.push(NamespaceTransform::new(search, replace));
    }
    transforms
}

fn write_units(units: &Units, files: &[SourceFile], out: &Path, replace: bool) -> Result<()> {
    for file in files {
        let Some(unit) = units.get(file.unit) else {
            continue;
        };
        let path = if replace {
            if !unit.is_edited() {
                continue;
            }
            unit.path.clone()
        } else {
            file.output_path(out)
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, unit.print())
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), "written");
    }
    Ok(())
}

fn report_parse_error(path: &Path, text: &str, error: &ParseError) {
    let id = path.display().to_string();
    let span = error.span.start..error.span.end.max(error.span.start);
    let _ = Report::build(ReportKind::Error, id.as_str(), span.start)
        .with_message("parse error")
        .with_label(
            Label::new((id.as_str(), span))
                .with_message(&error.message)
                .with_color(Color::Red),
        )
        .finish()
        .eprint((id.as_str(), Source::from(text)));
}
