use async_trait::async_trait;

use crate::error::Result;

/// Outbound fetch boundary. Adapters only ever see this trait, so tests can
/// substitute a canned responder or point the real client at a mock server.
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// GET a URL. Transport failures are errors; any HTTP status is a result.
    async fn get(&self, url: &str) -> Result<HttpGetResult>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
