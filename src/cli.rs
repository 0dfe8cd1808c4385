//! The command line interface for techmix.
use crate::input::load_model;
use crate::log;
use crate::output::metadata::write_metadata;
use crate::output::{create_output_directory, get_output_dir};
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for techmix.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for commands which write output files
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Whether to write every evaluated portfolio to an extra CSV file
    #[arg(long)]
    pub debug_model: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Search for optimal portfolios and near-optimal alternatives.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Dispatch a single portfolio against the model's demand.
    Dispatch {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Comma-separated capacity for each technology (defaults to nominal capacities)
        #[arg(long, value_delimiter = ',')]
        capacities: Option<Vec<f64>>,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Manage example models.
    Example {
        /// The available subcommands for managing example models.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Validate a model.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts, None),
            Self::Dispatch {
                model_dir,
                capacities,
                opts,
            } => handle_dispatch_command(&model_dir, capacities.as_deref(), &opts, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start techmix
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ techmix --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // Output program help in markdown format
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Initialise the program logger, unless this has already been done
fn init_logger(settings: &Settings, log_file_path: Option<&Path>) -> Result<()> {
    if log::is_logger_initialised() {
        return Ok(());
    }

    log::init(Some(&settings.log_level), log_file_path).context("Failed to initialise logging.")
}

/// Set the size of the thread pool used to evaluate portfolios, if one was requested
fn configure_threads(num_threads: usize) {
    if num_threads == 0 {
        return;
    }

    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        Ok(()) => info!("Evaluating portfolios on {num_threads} threads"),
        Err(err) => warn!("Could not set the number of threads: {err}"),
    }
}

/// Create the output folder for a command and start logging to it.
///
/// # Returns
///
/// The path to the output folder
fn prepare_output(model_path: &Path, opts: &RunOpts, settings: &Settings) -> Result<PathBuf> {
    // Get path to output folder
    let output_path = match opts.output_dir.as_deref() {
        Some(p) => p.to_path_buf(),
        None => get_output_dir(model_path)?,
    };

    let overwrite = create_output_directory(&output_path, opts.overwrite || settings.overwrite)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    // Initialise program logger
    init_logger(settings, Some(&output_path))?;
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }
    configure_threads(settings.num_threads);

    Ok(output_path)
}

/// Handle the `run` command.
pub fn handle_run_command(
    model_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    let output_path = prepare_output(model_path, opts, &settings)?;

    // Load the model to run
    let model = load_model(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    write_metadata(&output_path, model_path, "run", model.parameters.seed)
        .context("Failed to save metadata.")?;

    // This setting can be overridden by command-line argument
    let debug_model = opts.debug_model || settings.debug_model;
    crate::simulation::run(&model, &output_path, debug_model)?;
    info!("Run complete!");

    Ok(())
}

/// Handle the `dispatch` command.
pub fn handle_dispatch_command(
    model_path: &Path,
    capacities: Option<&[f64]>,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    let output_path = prepare_output(model_path, opts, &settings)?;

    let model = load_model(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    write_metadata(&output_path, model_path, "dispatch", model.parameters.seed)
        .context("Failed to save metadata.")?;

    crate::simulation::run_dispatch(&model, capacities, &output_path)?;
    info!("Dispatch complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    init_logger(&settings, None)?;

    // Load/validate the model
    load_model(model_path).context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}
