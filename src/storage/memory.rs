//! In-memory writer used to capture engine dumps without touching disk.

use super::DataWriter;
use crate::error::DocParseError;
use std::sync::Mutex;

/// Accumulates everything written to it, ignoring the target path.
///
/// The response assembler hands one of these to each `dump_*` call on a
/// [`crate::pipeline::analyze::PipelineResult`] and reads the buffer back.
#[derive(Debug, Default)]
pub struct MemoryDataWriter {
    buffer: Mutex<Vec<u8>>,
}

impl MemoryDataWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, decoded as UTF-8.
    pub fn value(&self) -> Result<String, DocParseError> {
        let buf = self.lock().clone();
        String::from_utf8(buf).map_err(|e| DocParseError::InvalidEngineOutput {
            detail: format!("dump is not valid UTF-8: {e}"),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DataWriter for MemoryDataWriter {
    fn write(&self, _path: &str, data: &[u8]) -> Result<(), DocParseError> {
        self.lock().extend_from_slice(data);
        Ok(())
    }
}
