//! Assertion helpers that give better failure messages than bare `unwrap()`.

use gqlfuzz::core::{SequenceOutcome, StepState};

/// Assert that a result is Ok and return the inner value.
#[allow(dead_code)]
pub fn assert_ok<T, E: std::fmt::Debug>(result: Result<T, E>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("{} failed: {:?}", context, e),
    }
}

/// Assert that a result is Err.
#[allow(dead_code)]
pub fn assert_err<T: std::fmt::Debug, E: std::fmt::Debug>(result: Result<T, E>, context: &str) {
    if let Ok(v) = result {
        panic!("{} should have failed but got: {:?}", context, v);
    }
}

/// Assert that an error message (including its source chain) contains
/// `expected_text`, case-insensitively.
#[allow(dead_code)]
pub fn assert_error_contains(error: &anyhow::Error, expected_text: &str, context: &str) {
    let error_str = format!("{:#}", error).to_lowercase();
    assert!(
        error_str.contains(&expected_text.to_lowercase()),
        "{}: error message should contain '{}', got: {:#}",
        context,
        expected_text,
        error
    );
}

/// Assert the terminal state of every step, in order.
#[allow(dead_code)]
pub fn assert_step_states(outcome: &SequenceOutcome, expected: &[StepState]) {
    let actual: Vec<StepState> = outcome.steps.iter().map(|s| s.state).collect();
    assert_eq!(
        actual,
        expected,
        "step states of {:?}",
        outcome.sequence.operations().collect::<Vec<_>>()
    );
}
