//! Tri-state result envelope for asynchronously loaded values.
//!
//! # Responsibility
//! - Represent loading, success and failure uniformly for view-facing code.
//! - Adapt payload types across layers without re-running queries.
//!
//! # Invariants
//! - Exactly one variant is active at a time.
//! - `map` only touches `Done`; `Loading` and `Error` pass through unchanged.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure classification carried by `ResultContainer::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderErrorKind {
    /// The wrapped loader returned an error.
    Failure,
    /// The wrapped loader panicked while computing.
    Panicked,
}

impl LoaderErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Failure => "failure",
            Self::Panicked => "panicked",
        }
    }
}

/// Error payload of a failed load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderError {
    pub kind: LoaderErrorKind,
    pub message: String,
}

impl LoaderError {
    pub fn new(kind: LoaderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Builds a `Failure` error from any error value.
    pub fn failure(err: &(dyn Error + 'static)) -> Self {
        Self::new(LoaderErrorKind::Failure, err.to_string())
    }
}

impl Display for LoaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "loader {}: {}", self.kind.as_str(), self.message)
    }
}

impl Error for LoaderError {}

/// Loading / success / failure envelope emitted by `LazyFlowLoader`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultContainer<T> {
    /// A computation is in flight.
    Loading,
    /// The latest computation (or `update`) produced this value.
    Done(T),
    /// The latest computation failed.
    Error(LoaderError),
}

impl<T> ResultContainer<T> {
    /// Transforms the `Done` payload, passing other variants through.
    pub fn map<U, F>(self, transform: F) -> ResultContainer<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Loading => ResultContainer::Loading,
            Self::Done(value) => ResultContainer::Done(transform(value)),
            Self::Error(err) => ResultContainer::Error(err),
        }
    }

    pub fn as_ref(&self) -> ResultContainer<&T> {
        match self {
            Self::Loading => ResultContainer::Loading,
            Self::Done(value) => ResultContainer::Done(value),
            Self::Error(err) => ResultContainer::Error(err.clone()),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns `true` for `Done` and `Error`.
    pub fn is_terminal(&self) -> bool {
        !self.is_loading()
    }

    pub fn done(&self) -> Option<&T> {
        match self {
            Self::Done(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LoaderError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Short variant label used in log lines.
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Done(_) => "done",
            Self::Error(_) => "error",
        }
    }
}

impl<T, E> From<Result<T, E>> for ResultContainer<T>
where
    E: Error + 'static,
{
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(value) => Self::Done(value),
            Err(err) => Self::Error(LoaderError::failure(&err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LoaderError, LoaderErrorKind, ResultContainer};

    #[test]
    fn map_transforms_done_payload() {
        let mapped = ResultContainer::Done(21).map(|value| value * 2);
        assert_eq!(mapped, ResultContainer::Done(42));
    }

    #[test]
    fn map_passes_error_through_unchanged() {
        let err = LoaderError::new(LoaderErrorKind::Failure, "disk unavailable");
        let mapped: ResultContainer<String> =
            ResultContainer::<i32>::Error(err.clone()).map(|value| value.to_string());
        assert_eq!(mapped, ResultContainer::Error(err));
    }

    #[test]
    fn map_passes_loading_through_and_skips_transform() {
        let mut calls = 0;
        let mapped = ResultContainer::<i32>::Loading.map(|value| {
            calls += 1;
            value + 1
        });
        assert!(mapped.is_loading());
        assert_eq!(calls, 0);
    }

    #[test]
    fn from_result_maps_err_to_failure() {
        let parsed: Result<i32, std::num::ParseIntError> = "x".parse::<i32>();
        let container = ResultContainer::from(parsed);
        let err = container.error().expect("parse failure should be an error");
        assert_eq!(err.kind, LoaderErrorKind::Failure);
        assert!(err.to_string().starts_with("loader failure:"));
    }

    #[test]
    fn accessors_follow_active_variant() {
        let done = ResultContainer::Done("a");
        assert!(done.is_done() && done.is_terminal());
        assert_eq!(done.done(), Some(&"a"));
        assert_eq!(done.as_ref().into_done(), Some(&"a"));

        let loading = ResultContainer::<&str>::Loading;
        assert!(!loading.is_terminal());
        assert_eq!(loading.into_done(), None);
    }
}
