use bytes::Bytes;

use crate::error::LoaderError;

/// Consumer-side callbacks of a loader.
///
/// Every method has a default, so a consumer implements only what it needs.
/// The default `on_error` hands the error back, which makes the loader return
/// it as `Err` to whoever emitted the failing event: leaving `on_error`
/// unimplemented is an explicit choice to turn faults into hard failures.
///
/// Callbacks run outside the loader's lock; calling `abort()` on a
/// [`LoaderHandle`](crate::LoaderHandle) from inside one is fine.
pub trait LoaderObserver: Send + Sync {
    /// Total size became known. Called at most once per loader.
    fn on_content_length_known(&self, _length: u64) {}

    /// A contiguous chunk covering `byte_start..received_length`.
    fn on_data_arrival(&self, _chunk: Bytes, _byte_start: u64, _received_length: u64) {}

    /// The transport finished delivering `range_from..` with `received_length` bytes in total.
    fn on_complete(&self, _range_from: u64, _received_length: u64) {}

    /// Return `Ok(())` once the error is handled.
    fn on_error(&self, error: LoaderError) -> Result<(), LoaderError> {
        Err(error)
    }
}
