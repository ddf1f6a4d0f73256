use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use similar::{ChangeTag, TextDiff};

use webstack_core::config::StackConfig;
use webstack_core::render::{self, Document, RenderOptions};
use webstack_deploy::settings::DeploySettings;
use webstack_deploy::{Deployment, schemas};

#[derive(Parser)]
#[command(name = "webstack")]
#[command(about = "Declare and preview a web application stack", long_about = None)]
struct Cli {
    /// Path to the stack configuration file
    #[arg(long, short, global = true, default_value = "Pulumi.dev.yaml")]
    config: PathBuf,

    /// Project namespace of unqualified configuration keys
    #[arg(long, global = true, default_value = "webapp")]
    project: String,

    /// Stack name (defaults to the <stack> in Pulumi.<stack>.yaml)
    #[arg(long, global = true)]
    stack: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the stack and validate every resource
    Validate,
    /// Print the rendered stack document
    Preview {
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,

        /// Render secret values instead of redacting them
        #[arg(long)]
        show_secrets: bool,

        /// Write the document to a file instead of stdout
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Show the dependency tree of the declared resources
    Graph,
    /// List exported outputs
    Outputs,
    /// Print the instance bootstrap script
    Bootstrap {
        /// Render secret values instead of redacting them
        #[arg(long)]
        show_secrets: bool,
    },
    /// Compare the rendered documents of two stack files
    Diff {
        old: PathBuf,
        new: PathBuf,

        /// Render secret values instead of redacting them
        #[arg(long)]
        show_secrets: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Validate => run_validate(&cli),
        Commands::Preview {
            format,
            show_secrets,
            out,
        } => run_preview(&cli, *format, *show_secrets, out.as_deref()),
        Commands::Graph => run_graph(&cli),
        Commands::Outputs => run_outputs(&cli),
        Commands::Bootstrap { show_secrets } => run_bootstrap(&cli, *show_secrets),
        Commands::Diff {
            old,
            new,
            show_secrets,
        } => run_diff(&cli, old, new, *show_secrets),
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "webstack", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Stack name from a `Pulumi.<stack>.yaml` file name
fn stack_name_from_path(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name
        .strip_suffix(".yaml")
        .or_else(|| file_name.strip_suffix(".yml"))?;
    let name = stem.strip_prefix("Pulumi.")?;
    (!name.is_empty()).then(|| name.to_string())
}

fn load_deployment(cli: &Cli, path: &Path) -> Result<Deployment, String> {
    let config = StackConfig::load(path, cli.project.as_str()).map_err(|e| e.to_string())?;
    let settings = DeploySettings::from_config(&config).map_err(|e| e.to_string())?;
    let stack_name = cli
        .stack
        .clone()
        .or_else(|| stack_name_from_path(path))
        .unwrap_or_else(|| "dev".to_string());
    log::debug!("loading stack {} from {}", stack_name, path.display());
    webstack_deploy::build(&settings, &stack_name).map_err(|e| e.to_string())
}

fn render_document(deployment: &Deployment, show_secrets: bool) -> Result<Document, String> {
    render::render(&deployment.stack, &schemas(), RenderOptions { show_secrets })
        .map_err(|e| e.to_string())
}

fn run_validate(cli: &Cli) -> Result<(), String> {
    println!("{}", "Validating...".cyan());
    let deployment = load_deployment(cli, &cli.config)?;
    let stack = &deployment.stack;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", stack.len())
            .green()
            .bold()
    );
    for resource in stack.resources() {
        let marker = if resource.is_data_source() { "○" } else { "•" };
        println!("  {} {}", marker, resource.id);
    }
    Ok(())
}

fn run_preview(
    cli: &Cli,
    format: Format,
    show_secrets: bool,
    out: Option<&Path>,
) -> Result<(), String> {
    let deployment = load_deployment(cli, &cli.config)?;
    let document = render_document(&deployment, show_secrets)?;
    let text = match format {
        Format::Yaml => document.to_yaml(),
        Format::Json => document.to_json(),
    }
    .map_err(|e| e.to_string())?;

    match out {
        Some(path) => {
            fs::write(path, &text)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            println!("{} {}", "Wrote".green().bold(), path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn run_graph(cli: &Cli) -> Result<(), String> {
    let deployment = load_deployment(cli, &cli.config)?;
    let graph = deployment.stack.dependency_graph();
    println!("{}", "Dependency Graph:".cyan().bold());
    println!();
    print!("{}", graph.display_with_color(true));
    Ok(())
}

fn run_outputs(cli: &Cli) -> Result<(), String> {
    let deployment = load_deployment(cli, &cli.config)?;
    let document = render_document(&deployment, false)?;
    let Some(outputs) = document.section("outputs") else {
        println!("{}", "No outputs.".yellow());
        return Ok(());
    };

    println!("{}", "Outputs:".cyan().bold());
    for (name, value) in outputs {
        let name = name.as_str().unwrap_or_default();
        let value = serde_json::to_string(value).map_err(|e| e.to_string())?;
        println!("  {} = {}", name.bold(), value);
    }
    Ok(())
}

fn run_bootstrap(cli: &Cli, show_secrets: bool) -> Result<(), String> {
    let deployment = load_deployment(cli, &cli.config)?;
    print!("{}", deployment.bootstrap.preview(show_secrets));
    Ok(())
}

fn run_diff(cli: &Cli, old: &Path, new: &Path, show_secrets: bool) -> Result<(), String> {
    let old_text = render_document(&load_deployment(cli, old)?, show_secrets)?
        .to_yaml()
        .map_err(|e| e.to_string())?;
    let new_text = render_document(&load_deployment(cli, new)?, show_secrets)?
        .to_yaml()
        .map_err(|e| e.to_string())?;

    if old_text == new_text {
        println!("{}", "No changes.".green());
        return Ok(());
    }
    print_diff(old, new, &old_text, &new_text);
    Ok(())
}

fn print_diff(old: &Path, new: &Path, old_text: &str, new_text: &str) {
    println!(
        "{} {} -> {}:",
        "Diff".cyan().bold(),
        old.display(),
        new.display()
    );

    let diff = TextDiff::from_lines(old_text, new_text);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-".red(),
            ChangeTag::Insert => "+".green(),
            ChangeTag::Equal => " ".normal(),
        };
        print!("{}{}", sign, change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_name_comes_from_file_name() {
        assert_eq!(
            stack_name_from_path(Path::new("infra/Pulumi.prod.yaml")),
            Some("prod".to_string())
        );
        assert_eq!(
            stack_name_from_path(Path::new("Pulumi.dev.yml")),
            Some("dev".to_string())
        );
        assert_eq!(stack_name_from_path(Path::new("Pulumi.yaml")), None);
        assert_eq!(stack_name_from_path(Path::new("stack.yaml")), None);
    }

    #[test]
    fn cli_arguments_parse() {
        let cli = Cli::try_parse_from([
            "webstack",
            "--config",
            "Pulumi.prod.yaml",
            "preview",
            "--format",
            "json",
            "--show-secrets",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("Pulumi.prod.yaml"));
        assert!(matches!(
            cli.command,
            Commands::Preview {
                format: Format::Json,
                show_secrets: true,
                out: None
            }
        ));
        Cli::command().debug_assert();
    }

    #[test]
    fn sample_stack_file_builds() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/Pulumi.dev.yaml");
        let cli = Cli::try_parse_from(["webstack", "validate"]).unwrap();
        let deployment = load_deployment(&cli, &path).unwrap();
        assert_eq!(deployment.stack.name(), "dev");
        let document = render_document(&deployment, false).unwrap();
        assert!(document.section("resources").is_some());
    }

    #[test]
    fn load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Pulumi.missing.yaml");
        let cli = Cli::try_parse_from(["webstack", "validate"]).unwrap();
        let err = load_deployment(&cli, &path).unwrap_err();
        assert!(err.contains("Pulumi.missing.yaml"), "{}", err);
    }
}
