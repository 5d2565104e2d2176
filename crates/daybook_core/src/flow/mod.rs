//! Reactive data-loading primitives.
//!
//! # Responsibility
//! - Bridge imperative repository calls into shared, cached result streams.
//! - Provide the tri-state envelope consumed by view-facing layers.
//!
//! # Invariants
//! - Loader failures are reported as `ResultContainer::Error`, never as
//!   panics or `Err` values on the public stream.
//! - At most one computation is in flight per `LazyFlowLoader`.

pub mod factory;
pub mod lazy_loader;
pub mod result;
pub mod value_loader;

pub use factory::{LazyFlowLoaderFactory, LoaderConfig};
pub use lazy_loader::{LazyFlowLoader, ResultStream};
pub use result::{LoaderError, LoaderErrorKind, ResultContainer};
pub use value_loader::{BlockingLoader, LoadFailure, ValueLoader};
