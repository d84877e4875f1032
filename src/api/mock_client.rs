use super::store::ChatStore;
use super::transport::{EventStream, Transport};
use crate::error::{StoreError, TransportError};
use crate::types::{ChatRecord, Message, StreamEvent, StreamRequest, Visibility};
use async_trait::async_trait;
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

type StreamItem = Result<StreamEvent, TransportError>;

enum MockScript {
    Events(Vec<StreamItem>),
    Live(mpsc::UnboundedReceiver<StreamItem>),
    FailOpen(String),
}

/// Scripted transport: each `open_stream` call consumes the next script.
#[derive(Clone, Default)]
pub struct MockTransport {
    scripts: Arc<Mutex<VecDeque<MockScript>>>,
    requests: Arc<Mutex<Vec<StreamRequest>>>,
}

/// Push side of a live mock stream. Dropping it ends the stream cleanly.
pub struct MockStreamHandle {
    tx: mpsc::UnboundedSender<StreamItem>,
}

impl MockStreamHandle {
    /// Returns false once the consumer has dropped the stream.
    pub fn send(&self, event: StreamEvent) -> bool {
        self.tx.send(Ok(event)).is_ok()
    }

    pub fn fail(&self, message: &str) -> bool {
        self.tx
            .send(Err(TransportError::Other(message.to_string())))
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_events(&self, events: Vec<StreamEvent>) {
        self.push(MockScript::Events(events.into_iter().map(Ok).collect()));
    }

    /// Emits `events`, then fails the stream with `message`.
    pub fn push_failure(&self, events: Vec<StreamEvent>, message: &str) {
        let mut items: Vec<StreamItem> = events.into_iter().map(Ok).collect();
        items.push(Err(TransportError::Other(message.to_string())));
        self.push(MockScript::Events(items));
    }

    pub fn push_open_failure(&self, message: &str) {
        self.push(MockScript::FailOpen(message.to_string()));
    }

    pub fn push_live(&self) -> MockStreamHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(MockScript::Live(rx));
        MockStreamHandle { tx }
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        lock(&self.requests).clone()
    }

    fn push(&self, script: MockScript) {
        lock(&self.scripts).push_back(script);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open_stream(&self, request: StreamRequest) -> Result<EventStream, TransportError> {
        lock(&self.requests).push(request);
        let script = lock(&self.scripts).pop_front();
        match script {
            Some(MockScript::Events(items)) => Ok(Box::pin(stream::iter(items))),
            Some(MockScript::Live(rx)) => Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            }))),
            Some(MockScript::FailOpen(message)) => Err(TransportError::Other(message)),
            None => Err(TransportError::Other(
                "MockTransport: no more responses configured".to_string(),
            )),
        }
    }
}

#[derive(Default)]
struct MockStoreState {
    chats: Vec<ChatRecord>,
    messages: HashMap<String, Vec<Message>>,
    failing_writes: usize,
    write_gate: Option<Arc<Notify>>,
    writes: usize,
}

/// In-memory chat store with injectable write failures.
#[derive(Clone, Default)]
pub struct MockChatStore {
    state: Arc<Mutex<MockStoreState>>,
}

impl MockChatStore {
    pub fn new(chats: Vec<ChatRecord>) -> Self {
        let store = Self::default();
        lock(&store.state).chats = chats;
        store
    }

    pub fn set_messages(&self, chat_id: &str, messages: Vec<Message>) {
        lock(&self.state)
            .messages
            .insert(chat_id.to_string(), messages);
    }

    /// Replaces the server-side records, e.g. to simulate derived fields.
    pub fn set_chats(&self, chats: Vec<ChatRecord>) {
        lock(&self.state).chats = chats;
    }

    pub fn chats(&self) -> Vec<ChatRecord> {
        lock(&self.state).chats.clone()
    }

    pub fn fail_next_writes(&self, count: usize) {
        lock(&self.state).failing_writes = count;
    }

    /// Makes every write wait for one `notify_one` on the returned handle.
    pub fn pause_writes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.state).write_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn write_count(&self) -> usize {
        lock(&self.state).writes
    }

    async fn write<F>(&self, chat_id: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut ChatRecord),
    {
        let gate = {
            let mut state = lock(&self.state);
            state.writes += 1;
            state.write_gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = lock(&self.state);
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(StoreError::Rejected(format!("mock write to {chat_id} failed")));
        }
        let record = state
            .chats
            .iter_mut()
            .find(|chat| chat.id == chat_id)
            .ok_or_else(|| StoreError::NotFound(chat_id.to_string()))?;
        apply(record);
        Ok(())
    }
}

#[async_trait]
impl ChatStore for MockChatStore {
    async fn list_chats(&self) -> Result<Vec<ChatRecord>, StoreError> {
        Ok(self.chats())
    }

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<(), StoreError> {
        let title = title.to_string();
        self.write(chat_id, move |record| record.title = title).await
    }

    async fn set_visibility(&self, chat_id: &str, visibility: Visibility) -> Result<(), StoreError> {
        self.write(chat_id, move |record| record.visibility = visibility)
            .await
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), StoreError> {
        self.write(chat_id, |_| {}).await?;
        let mut state = lock(&self.state);
        state.chats.retain(|chat| chat.id != chat_id);
        state.messages.remove(chat_id);
        Ok(())
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError> {
        let state = lock(&self.state);
        if !state.chats.iter().any(|chat| chat.id == chat_id) {
            return Err(StoreError::NotFound(chat_id.to_string()));
        }
        Ok(state.messages.get(chat_id).cloned().unwrap_or_default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
