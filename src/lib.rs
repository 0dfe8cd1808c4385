//! Common functionality for techmix.
//!
//! techmix designs energy technology portfolios under several objectives at once. A portfolio is
//! simulated over a demand series by the [`dispatch`] engine, scored by [`objective`] functions,
//! searched for Pareto-optimal capacity mixes by the [`expansion`] module and finally explored for
//! diverse near-optimal alternatives by the [`mga`] module.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod demand;
pub mod dispatch;
pub mod error;
pub mod expansion;
pub mod finance;
pub mod id;
pub mod input;
pub mod library;
pub mod log;
pub mod mga;
pub mod model;
pub mod objective;
pub mod output;
pub mod pareto;
pub mod portfolio;
pub mod settings;
pub mod simulation;
pub mod technology;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the path to the folder in which techmix stores its configuration files
pub fn get_techmix_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No platform config dir, so fall back on the working directory
        return PathBuf::new();
    };
    config_dir.push("techmix");

    config_dir
}
