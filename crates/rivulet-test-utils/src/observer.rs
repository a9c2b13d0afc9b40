use bytes::{Bytes, BytesMut};
use rivulet_loader::{ErrorInfo, LoaderError, LoaderErrorKind, LoaderHandle, LoaderObserver};
use rivulet_platform::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObservedCall {
    ContentLength(u64),
    Data {
        len: usize,
        byte_start: u64,
        received_length: u64,
    },
    Complete {
        range_from: u64,
        received_length: u64,
    },
    Error {
        kind: LoaderErrorKind,
        info: ErrorInfo,
    },
}

/// Observer that records every callback in order.
#[derive(Default)]
pub struct RecordingObserver {
    calls: Mutex<Vec<ObservedCall>>,
    data: Mutex<BytesMut>,
    handles_errors: bool,
    abort_after: Mutex<Option<(u64, LoaderHandle)>>,
}

impl RecordingObserver {
    /// Observer whose `on_error` reports the error as handled.
    pub fn handling_errors() -> Self {
        Self {
            handles_errors: true,
            ..Self::default()
        }
    }

    /// Observer that leaves errors unhandled.
    pub fn propagating_errors() -> Self {
        Self::default()
    }

    /// Abort `loader` from inside `on_data_arrival` once `bytes` were received.
    pub fn abort_after(&self, bytes: u64, loader: LoaderHandle) {
        *self.abort_after.lock() = Some((bytes, loader));
    }

    pub fn calls(&self) -> Vec<ObservedCall> {
        self.calls.lock().clone()
    }

    /// Concatenation of every delivered chunk.
    pub fn data(&self) -> Bytes {
        self.data.lock().clone().freeze()
    }

    pub fn data_calls(&self) -> Vec<(usize, u64, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ObservedCall::Data {
                    len,
                    byte_start,
                    received_length,
                } => Some((len, byte_start, received_length)),
                _ => None,
            })
            .collect()
    }

    pub fn content_lengths(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ObservedCall::ContentLength(len) => Some(len),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(LoaderErrorKind, ErrorInfo)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ObservedCall::Error { kind, info } => Some((kind, info)),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<(u64, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ObservedCall::Complete {
                    range_from,
                    received_length,
                } => Some((range_from, received_length)),
                _ => None,
            })
            .collect()
    }
}

impl LoaderObserver for RecordingObserver {
    fn on_content_length_known(&self, length: u64) {
        self.calls.lock().push(ObservedCall::ContentLength(length));
    }

    fn on_data_arrival(&self, chunk: Bytes, byte_start: u64, received_length: u64) {
        self.calls.lock().push(ObservedCall::Data {
            len: chunk.len(),
            byte_start,
            received_length,
        });
        self.data.lock().extend_from_slice(&chunk);

        let abort = self
            .abort_after
            .lock()
            .as_ref()
            .filter(|(bytes, _)| received_length >= *bytes)
            .map(|(_, handle)| handle.clone());
        if let Some(handle) = abort {
            handle.abort();
        }
    }

    fn on_complete(&self, range_from: u64, received_length: u64) {
        self.calls.lock().push(ObservedCall::Complete {
            range_from,
            received_length,
        });
    }

    fn on_error(&self, error: LoaderError) -> Result<(), LoaderError> {
        self.calls.lock().push(ObservedCall::Error {
            kind: error.kind(),
            info: error.info(),
        });
        if self.handles_errors {
            Ok(())
        } else {
            Err(error)
        }
    }
}
