//! Broker error types.
//!
//! None of these reach a client: the protocol has no error responses, so
//! callers log them at the dispatch boundary.

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("image encoding failed: {0}")]
    ImageEncoding(String),

    #[error("image encoder task failed: {0}")]
    EncoderTask(#[from] tokio::task::JoinError),

    #[error("outbound channel closed")]
    ChannelClosed,
}
