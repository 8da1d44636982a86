use async_trait::async_trait;

use crate::error::TrellisError;

// ── FetchResult ──────────────────────────────────────────────────────────────

/// Outcome of a size-capped CAS read. Each non-success code maps 1:1 to a
/// `TrellisError` variant via [`FetchResult::into_content`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchResult {
    Success(Vec<u8>),
    /// The fetched content does not hash to the requested URI.
    InvalidHash,
    /// The content exists but exceeds the caller's size cap.
    MaxSizeExceeded,
    /// The URI resolves to something other than a file (e.g. a directory).
    NotAFile,
    /// The store could not be contacted (includes fetch timeouts).
    CasNotReachable,
    /// The store is reachable but has no content for the URI.
    NotFound,
}

impl FetchResult {
    /// Unwrap the fetched bytes, or convert the failure code into the
    /// corresponding error. `uri` is only used for error context.
    pub fn into_content(self, uri: &str) -> Result<Vec<u8>, TrellisError> {
        match self {
            FetchResult::Success(bytes) => Ok(bytes),
            FetchResult::InvalidHash => Err(TrellisError::CasFileHashInvalid(uri.into())),
            FetchResult::MaxSizeExceeded => Err(TrellisError::CasFileTooLarge(uri.into())),
            FetchResult::NotAFile => Err(TrellisError::CasFileNotAFile(uri.into())),
            FetchResult::CasNotReachable => Err(TrellisError::CasNotReachable),
            FetchResult::NotFound => Err(TrellisError::CasFileNotFound(uri.into())),
        }
    }
}

// ── CasClient ────────────────────────────────────────────────────────────────

/// Content-addressable store client (IPFS-like). Consumed by the engine;
/// implementations live outside this workspace.
#[async_trait]
pub trait CasClient: Send + Sync {
    /// Store `content` and return its content-derived URI.
    async fn write(&self, content: &[u8]) -> Result<String, TrellisError>;

    /// Fetch the content at `uri`, refusing to return more than
    /// `max_size_in_bytes`.
    async fn read(&self, uri: &str, max_size_in_bytes: u64) -> FetchResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_result_codes_map_to_errors() {
        assert_eq!(
            FetchResult::Success(vec![1]).into_content("u").unwrap(),
            vec![1]
        );
        assert!(matches!(
            FetchResult::CasNotReachable.into_content("u"),
            Err(TrellisError::CasNotReachable)
        ));
        assert!(matches!(
            FetchResult::NotFound.into_content("u"),
            Err(TrellisError::CasFileNotFound(_))
        ));
        assert!(matches!(
            FetchResult::MaxSizeExceeded.into_content("u"),
            Err(TrellisError::CasFileTooLarge(_))
        ));
    }
}
