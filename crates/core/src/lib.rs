//! Core types for the Strata stress harness
//!
//! This crate defines the types shared by the store backends and the harness:
//! - Error taxonomy: StoreError/StoreErrorKind, WorkerError, HarnessError
//! - Configuration: HarnessConfig (`stress.toml`), SessionOptions, StorageMode
//! - Workload operations: Operation
//! - Verdicts: Verdict, Failure

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod operation;
pub mod verdict;

pub use config::{HarnessConfig, SessionOptions, StorageMode, CONFIG_FILE_NAME};
pub use error::{
    HarnessError, HarnessResult, StoreError, StoreErrorKind, StoreResult, WorkerError,
};
pub use operation::Operation;
pub use verdict::{Failure, Verdict};
