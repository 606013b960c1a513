use crate::error::Result;

/// Access to hardware registers and to the affinity of the calling thread
///
/// Register reads and writes name the hardware thread they are meant for.
/// Callers pin to that thread first through [`PinGuard`](super::PinGuard),
/// which is the only code path that calls `set_affinity`/`clear_affinity`.
pub trait RegisterPort: Send + Sync {
    /// Pin the calling execution context to `thread`
    fn set_affinity(&self, thread: usize) -> Result<()>;

    /// Release the pin taken by `set_affinity`
    fn clear_affinity(&self) -> Result<()>;

    fn read_register(&self, thread: usize, address: u64) -> Result<u64>;

    fn write_register(&self, thread: usize, address: u64, value: u64) -> Result<()>;
}
