//! The seam between the session controller and the network.

use async_trait::async_trait;
use ragdesk_client::{ChatStream, ClientError, RagClient};

/// Opens chat streams for the session controller.
///
/// This trait abstracts the client interface, allowing for fake
/// implementations in tests.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Open a chat stream for one question.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid or the connection could not
    /// be established.
    async fn open_chat_stream(
        &self,
        question: &str,
        top_k: u32,
    ) -> Result<ChatStream, ClientError>;
}

#[async_trait]
impl ChatTransport for RagClient {
    async fn open_chat_stream(
        &self,
        question: &str,
        top_k: u32,
    ) -> Result<ChatStream, ClientError> {
        RagClient::open_chat_stream(self, question, top_k).await
    }
}
