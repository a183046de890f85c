use std::{cell::RefCell, ffi::OsStr};

/// Step budget used when neither the flag nor `LMC_MAX_STEPS` gives one.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

#[derive(Clone, Copy)]
struct Env {
    trace: bool,
    max_steps: Option<u64>,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        trace: var_is("LMC_TRACE", "1"),
        max_steps: max_steps_from(std::env::var("LMC_MAX_STEPS").ok().as_deref()),
    };
    set_env(value);
}

/// Print every executed step.
pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace)
}

/// Default step budget. `None` is unbounded.
pub fn max_steps() -> Option<u64> {
    with_env(|env| env.max_steps)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}

/// `0` disables the budget. Unset or unparsable values fall back to the default.
fn max_steps_from(value: Option<&str>) -> Option<u64> {
    match value.and_then(|v| v.trim().parse::<u64>().ok()) {
        Some(0) => None,
        Some(max) => Some(max),
        None => Some(DEFAULT_MAX_STEPS),
    }
}
