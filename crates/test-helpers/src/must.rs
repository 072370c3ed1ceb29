//! Unwrap helpers with good error messages.
//!
//! These replace `unwrap()` and `expect()` in test code. `#[track_caller]`
//! keeps the panic location at the call site.

use std::fmt::Debug;

/// Unwrap a `Result`, panicking with the error value on `Err`.
///
/// ```rust
/// use omg_test_helpers::must;
///
/// let result: Result<i32, &str> = Ok(42);
/// assert_eq!(must(result), 42);
/// ```
///
/// # Panics
///
/// Panics if the result is `Err`.
#[track_caller]
pub fn must<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("must: unexpected Err: {e:?}"),
    }
}

/// Unwrap an `Option`, panicking with `msg` on `None`.
///
/// # Panics
///
/// Panics if the option is `None`.
#[track_caller]
pub fn must_some<T>(option: Option<T>, msg: &str) -> T {
    match option {
        Some(v) => v,
        None => panic!("must_some: {msg}"),
    }
}
