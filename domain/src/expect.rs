//! Hook-driven expectations: assert that create/update/delete statements
//! execute on a model a given number of times, without polling.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::counter::CompletionCounter;
use crate::report::Reporter;
use crate::{Model, Mutation, MutationStore};

const DEFAULT_TIMES_CALLED: u32 = 1;
const DEFAULT_STRICT: bool = true;

/// Configuration for the `expect_*` family.
///
/// Defaults: one expected call, strict overflow checking, a fresh counter.
#[derive(Clone, Debug)]
pub struct ExpectConfig {
    times: u32,
    strict: bool,
    counter: Option<Arc<CompletionCounter>>,
}

impl ExpectConfig {
    pub fn new() -> Self {
        Self {
            times: DEFAULT_TIMES_CALLED,
            strict: DEFAULT_STRICT,
            counter: None,
        }
    }

    /// Expect the mutation `times` times instead of once.
    pub fn calls(mut self, times: u32) -> Self {
        self.times = times;
        self
    }

    /// Tolerate calls beyond the expected count instead of failing the test.
    /// Excess calls are still logged through the reporter.
    pub fn without_maximum(mut self) -> Self {
        self.strict = false;
        self
    }

    /// Chain onto an existing counter instead of allocating a fresh one,
    /// letting one counter track several expectations.
    pub fn with_expectation(mut self, counter: Arc<CompletionCounter>) -> Self {
        self.counter = Some(counter);
        self
    }
}

impl Default for ExpectConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert that an insert statement executes on `model`.
///
/// Returns the armed counter for use with
/// [`ensure_completion`](crate::ensure_completion), or `None` when
/// registration failed (the failure is recorded on the reporter).
pub fn expect_created<R, S>(
    reporter: &Arc<R>,
    store: &S,
    model: &dyn Model,
    config: ExpectConfig,
) -> Option<Arc<CompletionCounter>>
where
    R: Reporter + ?Sized + 'static,
    S: MutationStore + ?Sized,
{
    expect_hook(reporter, store, model, Mutation::Create, config)
}

/// Assert that an update statement executes on `model`.
pub fn expect_updated<R, S>(
    reporter: &Arc<R>,
    store: &S,
    model: &dyn Model,
    config: ExpectConfig,
) -> Option<Arc<CompletionCounter>>
where
    R: Reporter + ?Sized + 'static,
    S: MutationStore + ?Sized,
{
    expect_hook(reporter, store, model, Mutation::Update, config)
}

/// Assert that a delete statement executes on `model`.
pub fn expect_deleted<R, S>(
    reporter: &Arc<R>,
    store: &S,
    model: &dyn Model,
    config: ExpectConfig,
) -> Option<Arc<CompletionCounter>>
where
    R: Reporter + ?Sized + 'static,
    S: MutationStore + ?Sized,
{
    expect_hook(reporter, store, model, Mutation::Delete, config)
}

fn expect_hook<R, S>(
    reporter: &Arc<R>,
    store: &S,
    model: &dyn Model,
    mutation: Mutation,
    config: ExpectConfig,
) -> Option<Arc<CompletionCounter>>
where
    R: Reporter + ?Sized + 'static,
    S: MutationStore + ?Sized,
{
    let table = match store.resolve_entity(model) {
        Ok(table) => table,
        Err(err) => {
            reporter.error(&err.to_string());
            return None;
        }
    };

    let times = config.times;
    let strict = config.strict;
    let counter = config
        .counter
        .unwrap_or_else(|| Arc::new(CompletionCounter::new()));
    counter.add(u64::from(times));

    let hook_name = format!("assert_{}_{}", mutation.as_str(), table);

    let hook_reporter = Arc::clone(reporter);
    let hook_counter = Arc::clone(&counter);
    let hook_table = table.clone();
    let times_called = AtomicU32::new(0);
    let hook = move |event: &crate::MutationEvent| {
        // The registry fans one mutation kind out to every hook; only react
        // to our own table.
        if event.table != hook_table {
            return;
        }

        // Taking the ticket atomically keeps concurrent dispatch from
        // passing the bound check twice and over-signalling the counter.
        let called = times_called.fetch_add(1, Ordering::SeqCst) + 1;
        if called <= times {
            hook_counter.done();
        } else {
            let message = format!(
                "{} hook asserts called {} times but called at least {} times",
                hook_table, times, called
            );
            if strict {
                hook_reporter.error(&message);
            } else {
                hook_reporter.log(&message);
            }
        }
    };

    if let Err(err) = store.register_hook(mutation, &hook_name, Box::new(hook)) {
        reporter.error(&err.to_string());
        return None;
    }

    Some(counter)
}
