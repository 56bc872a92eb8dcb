use crate::types::{FunctionCall, Outcome};

/// Declared calls and the outcome of their latest execution, by index.
///
/// Declarations are fixed once the store is built; outcomes are either all
/// cleared by [`TestCaseStore::reset`] or filled in one call at a time.
#[derive(Debug, Clone, Default)]
pub struct TestCaseStore {
    calls: Vec<FunctionCall>,
    outcomes: Vec<Option<Outcome>>,
}

impl TestCaseStore {
    pub fn new(calls: Vec<FunctionCall>) -> Self {
        let outcomes = vec![None; calls.len()];
        Self { calls, outcomes }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn calls(&self) -> &[FunctionCall] {
        &self.calls
    }

    /// Clear every outcome, in declaration order.
    pub fn reset(&mut self) {
        for outcome in &mut self.outcomes {
            *outcome = None;
        }
    }

    pub fn record(&mut self, index: usize, outcome: Outcome) {
        self.outcomes[index] = Some(outcome);
    }

    pub fn get(&self, index: usize) -> Option<FunctionCallTest<'_>> {
        self.calls.get(index).map(|call| FunctionCallTest {
            call,
            outcome: self.outcomes[index].as_ref(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = FunctionCallTest<'_>> + '_ {
        self.calls
            .iter()
            .zip(&self.outcomes)
            .map(|(call, outcome)| FunctionCallTest {
                call,
                outcome: outcome.as_ref(),
            })
    }
}

/// A declared call paired with what it produced, if it has run.
#[derive(Debug, Clone, Copy)]
pub struct FunctionCallTest<'a> {
    pub call: &'a FunctionCall,
    pub outcome: Option<&'a Outcome>,
}

impl<'a> FunctionCallTest<'a> {
    /// Actual output bytes; empty until the call has run.
    pub fn raw_bytes(&self) -> &'a [u8] {
        self.outcome.map(|o| o.raw_bytes.as_slice()).unwrap_or(&[])
    }

    /// Whether the call reverted; `None` until it has run.
    pub fn failure(&self) -> Option<bool> {
        self.outcome.map(|o| o.failure)
    }

    pub fn matches_expectation(&self) -> bool {
        match self.outcome {
            Some(outcome) => {
                outcome.failure == self.call.expectations.failure
                    && outcome.raw_bytes == self.call.expectations.raw_bytes
            }
            None => false,
        }
    }
}
