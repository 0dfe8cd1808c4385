//! The bundled demo models and the `example` command for working with them.
use super::{RunOpts, handle_run_command};
use crate::input::load_model;
use crate::model::Model;
use crate::settings::Settings;
use anyhow::{Context, Result, bail, ensure};
use clap::Subcommand;
use include_dir::{Dir, DirEntry, include_dir};
use itertools::Itertools;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The demo models, embedded in the binary
const EXAMPLES_DIR: Dir = include_dir!("demos");

/// The available subcommands for managing example models.
#[derive(Subcommand)]
pub enum ExampleSubcommands {
    /// List available examples.
    List,
    /// Describe an example and summarise its model parameters.
    Info {
        /// The name of the example.
        name: String,
    },
    /// Extract an example model configuration to a new directory.
    Extract {
        /// The name of the example to extract.
        name: String,
        /// The destination folder for the example.
        new_path: Option<PathBuf>,
    },
    /// Run an example.
    Run {
        /// The name of the example to run.
        name: String,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
}

impl ExampleSubcommands {
    /// Execute the supplied example subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::List => {
                for name in example_names() {
                    println!("{name}");
                }
            }
            Self::Info { name } => print!("{}", describe_example(&name)?),
            Self::Extract { name, new_path } => {
                let dest = new_path.unwrap_or_else(|| PathBuf::from(&name));
                extract_example(&name, &dest)?;
            }
            Self::Run { name, opts } => handle_example_run_command(&name, &opts, None)?,
        }

        Ok(())
    }
}

/// Names of the bundled examples
fn example_names() -> impl Iterator<Item = String> {
    EXAMPLES_DIR
        .dirs()
        .filter_map(|dir| dir.path().file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .sorted()
}

/// The example's README followed by a summary of the model it defines
fn describe_example(name: &str) -> Result<String> {
    let readme = EXAMPLES_DIR
        .get_file(Path::new(name).join("README.txt"))
        .context("Example not found.")?
        .contents_utf8()
        .context("README.txt is not UTF-8 encoded")?;

    let temp_dir = TempDir::new().context("Failed to create temporary directory.")?;
    let model_path = temp_dir.path().join(name);
    extract_example(name, &model_path)?;
    let model = load_model(&model_path).with_context(|| format!("Invalid example {name}"))?;

    let mut out = format!("{}\n\n", readme.trim_end());
    write_model_summary(&mut out, &model)?;
    Ok(out)
}

/// Summarise the parts of a model which shape a run
fn write_model_summary(out: &mut String, model: &Model) -> Result<()> {
    let params = &model.parameters;
    let technologies = model.technologies.iter().map(|tech| &tech.id).join(", ");
    let objectives = params.objectives.iter().map(|objective| &objective.name).join(", ");
    writeln!(out, "Technologies: {technologies}")?;
    writeln!(out, "Objectives: {objectives}")?;
    writeln!(
        out,
        "Demand: {} steps of {} h, peak {} MW",
        model.demand.len(),
        model.demand.time_delta().0,
        model.demand.max().0
    )?;
    writeln!(out, "Dispatch: {}", params.dispatch_strategy)?;
    writeln!(
        out,
        "Search: population {}, up to {} generations, seed {}",
        params.population_size, params.generations, params.seed
    )?;
    if params.n_alternatives == 0 {
        writeln!(out, "MGA: disabled")?;
    } else {
        writeln!(
            out,
            "MGA: {} alternatives from {} samples",
            params.n_alternatives, params.n_samples
        )?;
    }

    Ok(())
}

/// Copy an example's files into a new directory
fn extract_example(name: &str, new_path: &Path) -> Result<()> {
    let sub_dir = EXAMPLES_DIR.get_dir(name).context("Example not found.")?;
    ensure!(
        !new_path.exists(),
        "Destination directory {} already exists",
        new_path.display()
    );

    fs::create_dir(new_path)?;
    for entry in sub_dir.entries() {
        let DirEntry::File(file) = entry else {
            bail!("Subdirectories in examples not supported");
        };
        let file_name = file
            .path()
            .file_name()
            .context("Invalid file name in example")?;
        fs::write(new_path.join(file_name), file.contents())?;
    }

    Ok(())
}

/// Handle the `example run` command.
pub fn handle_example_run_command(
    name: &str,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let temp_dir = TempDir::new().context("Failed to create temporary directory.")?;
    let model_path = temp_dir.path().join(name);
    extract_example(name, &model_path)?;
    handle_run_command(&model_path, opts, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_example_names() {
        assert_eq!(example_names().collect_vec(), ["library_mix", "simple"]);
    }

    #[test]
    fn test_extract_example() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("simple");
        extract_example("simple", &dest).unwrap();
        assert!(dest.join("model.toml").is_file());
        assert!(dest.join("demand.csv").is_file());

        // Destination already exists
        assert!(extract_example("simple", &dest).is_err());
    }

    #[test]
    fn test_extract_unknown_example() {
        let dir = tempdir().unwrap();
        assert!(extract_example("no_such_example", &dir.path().join("x")).is_err());
    }

    #[test]
    fn test_describe_example() {
        let description = describe_example("simple").unwrap();
        assert!(description.contains("Technologies: gas, peaker, wind, battery"));
        assert!(description.contains("Demand: 24 steps of 1 h, peak 100 MW"));
        assert!(description.contains("Dispatch: hierarchical"));
        assert!(description.contains("MGA: 5 alternatives from 100 samples"));
        assert!(describe_example("no_such_example").is_err());
    }

    #[test]
    fn test_every_example_has_readme() {
        for name in example_names() {
            assert!(describe_example(&name).is_ok(), "{name} cannot be described");
        }
    }
}
