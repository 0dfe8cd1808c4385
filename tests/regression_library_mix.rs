//! A reproducibility test for the "library_mix" example
mod regression;
use regression::run_reproducibility_test;

#[test]
fn test_reproducibility_library_mix() {
    run_reproducibility_test("library_mix");
}
