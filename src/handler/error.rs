use std::io;

/// Failure inside a method handler
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("Request body too large ({size} bytes, limit {limit})")]
    BodyTooLarge { size: usize, limit: u64 },
}

impl HandlerError {
    /// Reject bodies above `limit` bytes
    pub fn check_body_size(body: &[u8], limit: u64) -> Result<(), Self> {
        let size = body.len();
        if u64::try_from(size).unwrap_or(u64::MAX) > limit {
            return Err(Self::BodyTooLarge { size, limit });
        }
        Ok(())
    }
}
