pub mod client;
pub mod logging;
pub mod mock_client;
pub mod store;
pub mod stream;
pub mod transport;

pub use client::HttpTransport;
pub use mock_client::{MockChatStore, MockStreamHandle, MockTransport};
pub use store::{ChatStore, HttpChatStore};
pub use transport::{ByteStream, EventStream, Transport};
