//! Table test driver
//!
//! Opens one or more tables and applies commands read from stdin to the
//! first one.
//!
//! Usage:
//!   cargo run --features cli --bin dict_cli -- [--flags NAMES] [--write] SPEC...
//!
//! Commands:
//!   get KEY            look up KEY
//!   put KEY VALUE      store VALUE under KEY
//!   del KEY            delete KEY
//!   first | next       iterate
//!   eval [-r] TEXT     expand $name references against the table
//!   flags              show the table's flags
//!   owner              show the table's owner
//!   changed            name the first table whose file changed
//!
//! Examples:
//!   echo "get postmaster" | dict_cli 'inline:{postmaster=root}'
//!   echo "get root" | dict_cli 'pipemap:{inline:{root=admin}, inline:{admin=ops}}'

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use ob_dict::{DictConfig, DictFlags, DictHandle, OpenMode, Recursion, Registry, Seq};

/// Exercise lookup tables from the command line
#[derive(Parser, Debug)]
#[command(name = "dict_cli")]
#[command(about = "Open lookup tables and run commands from stdin against the first one")]
struct Args {
    /// YAML configuration file; defaults to $DICT_CONFIG
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Table flags, e.g. "fold_fix|lock"
    #[arg(long, short = 'f', default_value = "")]
    flags: String,

    /// Open tables read-write instead of read-only
    #[arg(long, short = 'w')]
    write: bool,

    /// Table specs, `type:name`
    #[arg(required = true)]
    specs: Vec<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => DictConfig::from_file(path)?,
        None => DictConfig::from_env()?,
    };
    let flags = DictFlags::parse_names(&args.flags).context("Invalid --flags")?;
    let mode = if args.write {
        OpenMode::ReadWrite
    } else {
        OpenMode::ReadOnly
    };

    let registry = Registry::with_config(config);
    let mut opened = Vec::with_capacity(args.specs.len());
    for spec in &args.specs {
        let handle = registry
            .open(spec, mode, flags)
            .with_context(|| format!("Failed to open {spec}"))?;
        opened.push((registry.registered_name(spec, mode, flags)?, handle));
    }
    let (name, table) = &opened[0];

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let reply = run_command(&registry, name, table, line);
        writeln!(stdout, "{reply}")?;
    }

    for (name, _) in &opened {
        registry.unregister(name);
    }
    Ok(())
}

/// Execute one command and render its outcome as a single line.
fn run_command(registry: &Registry, name: &str, table: &DictHandle, line: &str) -> String {
    let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let outcome = match cmd {
        "get" if !rest.is_empty() => table
            .lookup(rest)
            .map(|found| found.unwrap_or_else(|| format!("{rest}: not found"))),
        "put" => match rest.split_once(char::is_whitespace) {
            Some((key, value)) => table
                .update(key, value.trim())
                .map(|status| format!("{key}: {status:?}")),
            None => return "usage: put KEY VALUE".to_string(),
        },
        "del" if !rest.is_empty() => table
            .delete(rest)
            .map(|status| format!("{rest}: {status:?}")),
        "first" | "next" => {
            let how = if cmd == "first" { Seq::First } else { Seq::Next };
            table.sequence(how).map(|entry| match entry {
                Some((key, value)) => format!("{key}={value}"),
                None => "end of table".to_string(),
            })
        }
        "eval" => {
            let (recursion, text) = match rest.strip_prefix("-r") {
                Some(text) => (Recursion::Recursive, text.trim_start()),
                None => (Recursion::Once, rest),
            };
            registry.eval(name, text, recursion)
        }
        "flags" => Ok(table.flags().to_names()),
        "owner" => Ok(table.owner().to_string()),
        "changed" => Ok(registry
            .changed_name()
            .unwrap_or_else(|| "no change".to_string())),
        _ => return format!("unknown command: {line}"),
    };

    match outcome {
        Ok(text) => text,
        Err(e) => format!("error ({}): {e}", e.kind()),
    }
}
