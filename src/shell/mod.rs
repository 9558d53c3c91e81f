//! Shell execution and command grouping.
//!
//! This module launches approved commands as `sh -c` child processes, records
//! their outcomes, and partitions flat command lists into batches that are
//! safe to run side by side.

mod grouping;
mod subprocess;

pub use grouping::{group_independent, is_parallel_safe, split_command_lines};
pub use subprocess::{ExecError, ExecOutcome, ExecRequest, Executor, OutputLock, OutputMode};
