//! A reproducibility test for the "simple" example
mod regression;
use regression::run_reproducibility_test;

#[test]
fn test_reproducibility_simple() {
    run_reproducibility_test("simple");
}
