//! The value + error pair returned for every invocation.

use crate::error::{ErrorKind, WireError};

/// Size of an encoded result.
pub const RESULT_SIZE: usize = 8;

/// Result of a remote call.
///
/// When `error` is non-zero it is authoritative and `value` is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallResult {
    pub value: u32,
    pub error: u32,
}

impl CallResult {
    pub fn ok(value: u32) -> Self {
        Self { value, error: 0 }
    }

    pub fn err(kind: ErrorKind) -> Self {
        Self {
            value: 0,
            error: kind.code(),
        }
    }

    /// Error carried by this result, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.error)
    }

    pub fn into_result(self) -> Result<u32, ErrorKind> {
        match self.error_kind() {
            Some(kind) => Err(kind),
            None => Ok(self.value),
        }
    }

    pub fn encode(&self) -> [u8; RESULT_SIZE] {
        let mut buf = [0u8; RESULT_SIZE];
        buf[..4].copy_from_slice(&self.value.to_le_bytes());
        buf[4..].copy_from_slice(&self.error.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < RESULT_SIZE {
            return Err(WireError::Truncated {
                expected: RESULT_SIZE,
                actual: buf.len(),
            });
        }
        Ok(Self {
            value: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            error: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}

impl From<Result<u32, ErrorKind>> for CallResult {
    fn from(result: Result<u32, ErrorKind>) -> Self {
        match result {
            Ok(value) => CallResult::ok(value),
            Err(kind) => CallResult::err(kind),
        }
    }
}
