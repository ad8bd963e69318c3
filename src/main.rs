use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rcgraph::id::UuidIds;
use rcgraph::render::{self, ShellType};
use rcgraph::{ConfigNode, EngineConfig, Template, envelope, tree};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "rcgraph")]
#[command(about = "Modular shell startup config engine", long_about = None)]
struct Cli {
    /// JSON settings file (layout, shell, config_dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an envelope file; exits non-zero when it is invalid.
    Validate {
        #[arg(long)]
        envelope: PathBuf,
    },

    /// Write an installer script that creates every fragment file.
    Render {
        #[arg(long)]
        envelope: PathBuf,

        #[arg(long)]
        shell: Option<ShellType>,

        #[arg(long)]
        config_dir: Option<String>,

        #[arg(short = 'o', long)]
        out: PathBuf,
    },

    /// Write a starter envelope.
    Template {
        #[arg(long)]
        name: Template,

        #[arg(long)]
        shell: Option<ShellType>,

        #[arg(short = 'o', long)]
        out: PathBuf,
    },

    /// Print the tree outline with levels and cross-references.
    Tree {
        #[arg(long)]
        envelope: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.cmd {
        Commands::Validate { envelope } => {
            let value = envelope::parse_value(&read(&envelope)?)
                .with_context(|| format!("parse {}", envelope.display()))?;
            let report = envelope::validate(&value);
            match report.error {
                None => println!("valid"),
                Some(err) => bail!("{}: {}", envelope.display(), err),
            }
        }

        Commands::Render {
            envelope,
            shell,
            config_dir,
            out,
        } => {
            let imported = envelope::parse_envelope(&read(&envelope)?)?;
            // An explicit flag wins, then the root's flavor, then the config file.
            let shell = shell
                .or_else(|| ShellType::from_root_kind(imported.tree.kind))
                .unwrap_or(config.shell);
            let config_dir = config_dir.unwrap_or(config.config_dir);

            let script = render::render_installer(&imported.tree, shell, &config_dir)?;
            std::fs::write(&out, script)?;
            println!("Wrote {}", out.display());
        }

        Commands::Template { name, shell, out } => {
            let shell = shell.unwrap_or(config.shell);
            let root = tree::relevel(&Arc::new(name.build(&mut UuidIds, shell)), 0);
            let positions = rcgraph::layout::layout_tree(&root, &config.layout);
            let text = envelope::export_to_envelope(&root, &positions)
                .with_metadata(envelope::Metadata {
                    name: Some(name.to_string()),
                    ..envelope::Metadata::default()
                })
                .to_json_pretty()?;
            std::fs::write(&out, text)?;
            println!("Wrote {}", out.display());
        }

        Commands::Tree { envelope } => {
            let imported = envelope::parse_envelope(&read(&envelope)?)?;
            print!("{}", outline(&imported.tree));
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn outline(root: &Arc<ConfigNode>) -> String {
    let mut out = String::new();
    for id in tree::ids(root) {
        let Some(node) = tree::find(root, &id) else {
            continue;
        };
        out.push_str(&format!(
            "{}{} [{}] {:?} (level {})\n",
            "  ".repeat(node.level as usize),
            node.id,
            node.kind,
            node.title,
            node.level
        ));
        let deps = tree::depends_on(root, &id);
        if !deps.is_empty() {
            out.push_str(&format!(
                "{}  depends on: {}\n",
                "  ".repeat(node.level as usize),
                join(&deps)
            ));
        }
        let req = tree::required_by(root, &id);
        if !req.is_empty() {
            out.push_str(&format!(
                "{}  required by: {}\n",
                "  ".repeat(node.level as usize),
                join(&req)
            ));
        }
    }
    out
}

fn join(ids: &[rcgraph::NodeId]) -> String {
    ids.iter().map(|i| i.as_str()).collect::<Vec<_>>().join(", ")
}
