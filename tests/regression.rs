//! Common code for running reproducibility tests on the example models.
use float_cmp::approx_eq;
use itertools::Itertools;
use std::fs::{File, read_dir};
use std::io::{BufRead, BufReader};
use std::path::Path;
use techmix::cli::RunOpts;
use techmix::cli::example::handle_example_run_command;
use techmix::settings::Settings;
use tempfile::tempdir;

const FLOAT_CMP_TOLERANCE: f64 = 1e-10;

/// Run an example model twice with the same seed and check the outputs are identical
#[allow(dead_code)]
pub fn run_reproducibility_test(example_name: &str) {
    unsafe { std::env::set_var("TECHMIX_LOG_LEVEL", "off") };

    let run = || {
        let tempdir = tempdir().unwrap();
        let opts = RunOpts {
            output_dir: Some(tempdir.path().to_path_buf()),
            overwrite: false,
            debug_model: true,
        };
        handle_example_run_command(example_name, &opts, Some(Settings::default())).unwrap();
        tempdir
    };

    let first = run();
    let second = run();
    compare_output_dirs(first.path(), second.path());
}

fn compare_output_dirs(output_dir1: &Path, output_dir2: &Path) {
    let file_names = get_csv_file_names(output_dir1);
    assert_eq!(
        file_names,
        get_csv_file_names(output_dir2),
        "Different output files were written"
    );

    let errors = file_names
        .iter()
        .flat_map(|file_name| {
            compare_files(
                &output_dir1.join(file_name),
                &output_dir2.join(file_name),
                file_name,
            )
        })
        .collect_vec();
    assert!(
        errors.is_empty(),
        "The following errors occurred:\n  * {}",
        errors.join("\n  * ")
    );
}

/// Compare two CSV files field by field, returning a description of each difference
fn compare_files(path1: &Path, path2: &Path, file_name: &str) -> Vec<String> {
    let lines1 = read_lines(path1);
    let lines2 = read_lines(path2);
    let mut errors = Vec::new();
    if lines1.len() != lines2.len() {
        errors.push(format!(
            "{file_name}: Different number of lines: {} vs {}",
            lines1.len(),
            lines2.len()
        ));
    }

    for (num, (line1, line2)) in lines1.iter().zip(&lines2).enumerate() {
        let fields1 = line1.split(',').collect_vec();
        let fields2 = line2.split(',').collect_vec();
        let same = fields1.len() == fields2.len()
            && fields1
                .iter()
                .zip(&fields2)
                .all(|(f1, f2)| fields_match(f1, f2));
        if !same {
            errors.push(format!(
                "{file_name}: line {num}:\n    + \"{line1}\"\n    - \"{line2}\""
            ));
        }
    }

    errors
}

/// Compare fields as floating-point values where possible, otherwise as strings
fn fields_match(field1: &str, field2: &str) -> bool {
    match (field1.parse::<f64>(), field2.parse::<f64>()) {
        (Ok(value1), Ok(value2)) if value1.is_finite() && value2.is_finite() => approx_eq!(
            f64,
            value1,
            value2,
            epsilon = FLOAT_CMP_TOLERANCE
        ),
        _ => field1 == field2,
    }
}

/// Get the sorted names of the CSV files in the given folder
fn get_csv_file_names(dir_path: &Path) -> Vec<String> {
    read_dir(dir_path)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|file_name| file_name.ends_with(".csv"))
        .sorted()
        .collect()
}

/// Read all lines from a file
fn read_lines(path: &Path) -> Vec<String> {
    BufReader::new(File::open(path).unwrap())
        .lines()
        .map_while(Result::ok)
        .collect()
}
