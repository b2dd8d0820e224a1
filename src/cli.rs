//! Command-line interface for devgen
//!
//! `generate`, `context`, `validate` and `config` subcommands over the
//! library API. All output, including errors, is produced here; `main` only
//! maps the returned [`ExitCode`] to the process exit status.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::{
    CliArgs, Config, DevgenError, ExitCode, GenerationOutput, ValidationOutcome, check_devcontainer,
    context_report, github_from_config, pipeline_from_config,
};
use devgen_context::tokens::Tokenizer;
use devgen_utils::atomic_write::write_file_atomic;
use devgen_utils::logging::{init_tracing, init_tracing_json};

const DEVCONTAINER_DIR: &str = ".devcontainer";
const DEVCONTAINER_FILE: &str = "devcontainer.json";
const COMPOSE_FILE: &str = "docker-compose.yml";

/// devgen - generate devcontainer.json files for GitHub repositories
#[derive(Parser, Debug)]
#[command(name = "devgen")]
#[command(about = "Generate validated devcontainer.json files from public GitHub repositories")]
#[command(long_about = r#"
devgen reads a public GitHub repository (file tree, language profile and
dependency manifests), asks a language model for a Dev Container configuration
and only accepts it once it validates against the Dev Container schema.

EXAMPLES:
  # Generate and print a configuration
  devgen generate https://github.com/acme/widgets

  # Write .devcontainer/devcontainer.json and a compose file under ./widgets
  devgen generate https://github.com/acme/widgets --compose --output-dir ./widgets

  # Ignore stored and committed configurations
  devgen generate https://github.com/acme/widgets --regenerate

  # Show the context the model would see, cut to 2000 tokens
  devgen context https://github.com/acme/widgets --budget 2000

  # Validate a configuration file
  devgen validate .devcontainer/devcontainer.json

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > environment > config file > defaults
  The config file is discovered by searching upward from CWD for .devgen/config.toml
  Use --config to specify an explicit config file path
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Model (or Azure deployment) for completion calls
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Additional generation attempts after the first
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Directory depth of the repository listing
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Directory of the file-backed configuration store
    #[arg(long, global = true)]
    pub store_path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Produce a devcontainer.json for a repository
    Generate {
        /// Repository URL, e.g. https://github.com/acme/widgets
        url: String,

        /// Skip the stored-record and committed-configuration shortcuts
        #[arg(long)]
        regenerate: bool,

        /// Also generate a docker-compose file
        #[arg(long)]
        compose: bool,

        /// Write `.devcontainer/` files under this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the repository context and its token counts
    Context {
        /// Repository URL
        url: String,

        /// Token budget (defaults to the configured context budget)
        #[arg(long)]
        budget: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a devcontainer.json against the schema
    Validate {
        /// File to validate
        file: PathBuf,
    },

    /// Print the effective configuration with the source of each value
    Config,
}

impl Cli {
    fn cli_args(&self) -> CliArgs {
        let generate_compose = match &self.command {
            Commands::Generate { compose: true, .. } => Some(true),
            _ => None,
        };
        CliArgs {
            config_path: self.config.clone(),
            model: self.model.clone(),
            max_retries: self.max_retries,
            context_token_budget: None,
            max_depth: self.max_depth,
            generate_compose,
            store_path: self.store_path.clone(),
        }
    }
}

/// Parse arguments and run the selected command.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let logging = if cli.log_json {
        init_tracing_json(cli.verbose)
    } else {
        init_tracing(cli.verbose)
    };
    if let Err(e) = logging {
        eprintln!("warning: logging unavailable: {e}");
    }

    let config = match Config::discover(&cli.cli_args()) {
        Ok(config) => config,
        Err(err) => return Err(report(&DevgenError::Config(err))),
    };
    tracing::debug!(config_path = ?config.config_path, "configuration loaded");

    match cli.command {
        Commands::Config => {
            print!("{}", render_effective_config(&config, &config.check_env()));
            Ok(())
        }
        Commands::Validate { file } => match validate_file(&file) {
            Ok(outcome) => {
                print!("{}", render_validation(&file, &outcome));
                if outcome.valid {
                    Ok(())
                } else {
                    Err(ExitCode::INVALID_INPUT)
                }
            }
            Err(e) => {
                eprintln!("✗ {e:#}");
                Err(ExitCode::INVALID_INPUT)
            }
        },
        Commands::Generate {
            url,
            regenerate,
            output_dir,
            json,
            ..
        } => {
            let rt = runtime()?;
            let output = rt
                .block_on(async {
                    let pipeline = pipeline_from_config(&config)?;
                    pipeline.generate(&url, regenerate).await
                })
                .map_err(|e| report(&e))?;
            emit_generation(&output, output_dir.as_deref(), json)
        }
        Commands::Context { url, budget, json } => {
            let rt = runtime()?;
            let budget = budget.unwrap_or(config.defaults.context_token_budget);
            let report_result = rt.block_on(async {
                let repo = github_from_config(&config)?;
                let tokenizer = Tokenizer::shared()?;
                context_report(&repo, tokenizer, config.defaults.max_depth, &url, budget).await
            });
            let context = report_result.map_err(|e| report(&e))?;
            if json {
                print_json(&context)
            } else {
                println!("{}", context.context.as_str());
                eprintln!(
                    "repository: {}\nassembled tokens: {}\nbudget: {}\ncontext tokens: {}{}",
                    context.repo_url,
                    context.assembled_tokens,
                    context.budget,
                    context.context.tokens(),
                    if context.context.is_truncated() { " (truncated)" } else { "" }
                );
                Ok(())
            }
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, ExitCode> {
    tokio::runtime::Runtime::new().map_err(|e| {
        eprintln!("✗ Failed to create async runtime: {e}");
        ExitCode::INTERNAL
    })
}

fn report(err: &DevgenError) -> ExitCode {
    tracing::debug!(error = ?err, "command failed");
    eprintln!("✗ {}", err.display_for_user());
    ExitCode::from_error(err)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ExitCode> {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Failed to serialize output: {e}");
            Err(ExitCode::INTERNAL)
        }
    }
}

fn emit_generation(output: &GenerationOutput, output_dir: Option<&Path>, json: bool) -> Result<(), ExitCode> {
    if let Some(dir) = output_dir {
        match write_outputs(dir, output) {
            Ok(paths) => {
                for path in paths {
                    eprintln!("✓ wrote {}", path.display());
                }
            }
            Err(e) => {
                eprintln!("✗ {e:#}");
                return Err(ExitCode::PERSISTENCE);
            }
        }
    }

    if json {
        return print_json(output);
    }

    if output_dir.is_none() {
        println!("{}", output.devcontainer_json);
        if let Some(compose) = &output.compose_yaml {
            println!("---\n{compose}");
        }
    }
    eprintln!(
        "{} ({}, {} attempt{})",
        output.repo_url,
        output.provenance,
        output.attempts,
        if output.attempts == 1 { "" } else { "s" }
    );
    if !output.persisted {
        eprintln!("warning: result was not saved to the configuration store");
    }
    Ok(())
}

/// Write the configuration (and compose file, if any) under `dir/.devcontainer/`.
pub fn write_outputs(dir: &Path, output: &GenerationOutput) -> Result<Vec<PathBuf>> {
    let target = dir.join(DEVCONTAINER_DIR);
    std::fs::create_dir_all(&target)
        .with_context(|| format!("Failed to create {}", target.display()))?;

    let mut written = Vec::new();
    let devcontainer = target.join(DEVCONTAINER_FILE);
    write_file_atomic(&devcontainer, &with_newline(&output.devcontainer_json))
        .with_context(|| format!("Failed to write {}", devcontainer.display()))?;
    written.push(devcontainer);

    if let Some(compose) = &output.compose_yaml {
        let path = target.join(COMPOSE_FILE);
        write_file_atomic(&path, &with_newline(compose))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn with_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

/// Read `path` and check it against the base schema
pub fn validate_file(path: &Path) -> Result<ValidationOutcome> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(check_devcontainer(&text))
}

fn render_validation(path: &Path, outcome: &ValidationOutcome) -> String {
    if outcome.valid {
        return format!("✓ {} is valid\n", path.display());
    }
    let mut out = format!("✗ {} is invalid:\n", path.display());
    for error in &outcome.errors {
        out.push_str("  - ");
        out.push_str(error);
        out.push('\n');
    }
    out
}

/// `key = value  [source]` lines followed by any missing environment variables
pub fn render_effective_config(config: &Config, missing_env: &[String]) -> String {
    let effective = config.effective_config();
    let width = effective.keys().map(String::len).max().unwrap_or(0);

    let mut out = String::new();
    if let Some(path) = &config.config_path {
        out.push_str(&format!("# config file: {}\n", path.display()));
    }
    for (key, (value, source)) in &effective {
        out.push_str(&format!("{key:<width$} = {value}  [{source}]\n"));
    }
    if !missing_env.is_empty() {
        out.push_str("\nMissing environment variables:\n");
        for key in missing_env {
            out.push_str(&format!("  - {key}\n"));
        }
    }
    out
}
