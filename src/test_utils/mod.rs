//! Shared test utilities for contrib-rank.

pub mod logging;

/// Table-driven test case structure.
#[derive(Debug, Clone)]
pub struct TestCase<I, E> {
    pub name: &'static str,
    pub input: I,
    pub expected: E,
}

/// Run table-driven tests, reporting the first mismatch by case name.
pub fn run_table_tests<I, E, F>(cases: Vec<TestCase<I, E>>, test_fn: F) -> Result<(), String>
where
    I: std::fmt::Debug + Clone,
    E: std::fmt::Debug + PartialEq,
    F: Fn(I) -> E,
{
    for case in cases {
        let start = std::time::Instant::now();
        println!("case {}: input {:?}", case.name, case.input);

        let actual = test_fn(case.input.clone());
        let elapsed = start.elapsed();

        if actual != case.expected {
            return Err(format!(
                "case {}: expected {:?}, got {actual:?}",
                case.name, case.expected
            ));
        }
        println!("case {}: ok in {elapsed:?}", case.name);
    }
    Ok(())
}
