//! Execution policy for operators with data-parallel kernels.
//!
//! Parallelism never changes results: the parallel and sequential code
//! paths of every kernel accumulate in the same order per output sample.

/// Controls when parallel-capable kernels switch from sequential to
/// multi-threaded execution.
///
/// The unit of `min_parallel_work` is "multiply-accumulate operations per
/// apply call" (output length x kernel length x batch width for the
/// convolution kernels). Below the threshold the thread-launch overhead
/// dominates and the kernels stay sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecPolicy {
    /// Minimum estimated work before a kernel uses the thread pool.
    pub min_parallel_work: usize,
}

impl ExecPolicy {
    /// Policy that never parallelizes, regardless of input size.
    pub const SEQUENTIAL: ExecPolicy = ExecPolicy {
        min_parallel_work: usize::MAX,
    };

    /// Whether `work` multiply-accumulates warrant the thread pool.
    pub fn should_parallelize(&self, work: usize) -> bool {
        work >= self.min_parallel_work
    }
}

impl Default for ExecPolicy {
    fn default() -> Self {
        ExecPolicy {
            min_parallel_work: 100_000,
        }
    }
}
