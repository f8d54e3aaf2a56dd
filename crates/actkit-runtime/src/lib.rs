pub mod error;
pub mod execution;
pub mod runtime;

pub use error::{RuntimeError, RuntimeResult};
pub use execution::{ExecutionMetadata, ExecutionOptions, ExecutionResult};
pub use runtime::Runtime;
