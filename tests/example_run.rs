//! Integration tests for the `example run` command.
use techmix::cli::RunOpts;
use techmix::cli::example::handle_example_run_command;
use techmix::settings::Settings;
use tempfile::tempdir;

/// An integration test for the `example run` command.
#[test]
fn test_handle_example_run_command() {
    unsafe { std::env::set_var("TECHMIX_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().join("library_mix")),
        ..Default::default()
    };
    handle_example_run_command("library_mix", &opts, Some(Settings::default())).unwrap();
    assert!(tempdir.path().join("library_mix/pareto_front.csv").is_file());
}
