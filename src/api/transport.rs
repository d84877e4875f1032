use crate::error::TransportError;
use crate::types::{StreamEvent, StreamRequest};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, TransportError>> + Send>>;

/// Opens one agent stream per request.
///
/// Dropping the returned stream must release the underlying connection;
/// the session relies on that to cancel an in-flight response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open_stream(&self, request: StreamRequest) -> Result<EventStream, TransportError>;
}
