use super::optimistic::{OptimisticCache, OptimisticEdit};
use crate::api::ChatStore;
use crate::error::StoreError;
use crate::types::{ChatRecord, Visibility};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatField {
    Title,
    Visibility,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatFieldValue {
    Title(String),
    Visibility(Visibility),
}

pub type ChatFieldKey = (String, ChatField);

/// The user's conversation list, with optimistic title/visibility edits.
pub struct ChatHistory {
    store: Arc<dyn ChatStore>,
    cache: OptimisticCache<ChatFieldKey, ChatFieldValue>,
    records: Arc<Mutex<Vec<ChatRecord>>>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChatHistory {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self {
            store,
            cache: OptimisticCache::new(),
            records: Arc::new(Mutex::new(Vec::new())),
            refresh_task: Mutex::new(None),
        }
    }

    /// Refetches the list and reconciles every field without a pending write.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        refresh_into(self.store.as_ref(), &self.cache, &self.records).await
    }

    /// Records as the UI should show them: server data with local edits on top.
    pub fn chats(&self) -> Vec<ChatRecord> {
        lock(&self.records)
            .iter()
            .cloned()
            .map(|mut record| {
                if let Some(title) = self.title(&record.id) {
                    record.title = title;
                }
                if let Some(visibility) = self.visibility(&record.id) {
                    record.visibility = visibility;
                }
                record
            })
            .collect()
    }

    pub fn title(&self, chat_id: &str) -> Option<String> {
        match self.cache.get(&(chat_id.to_string(), ChatField::Title)) {
            Some(ChatFieldValue::Title(title)) => Some(title),
            _ => None,
        }
    }

    pub fn visibility(&self, chat_id: &str) -> Option<Visibility> {
        match self.cache.get(&(chat_id.to_string(), ChatField::Visibility)) {
            Some(ChatFieldValue::Visibility(visibility)) => Some(visibility),
            _ => None,
        }
    }

    pub fn edit(&self, chat_id: &str, field: ChatField) -> Option<OptimisticEdit<ChatFieldValue>> {
        self.cache.edit(&(chat_id.to_string(), field))
    }

    pub async fn set_visibility(&self, chat_id: &str, visibility: Visibility) -> Result<(), StoreError> {
        let store = Arc::clone(&self.store);
        let owned_id = chat_id.to_string();
        self.cache
            .mutate(
                (chat_id.to_string(), ChatField::Visibility),
                ChatFieldValue::Visibility(visibility),
                |_| async move { store.set_visibility(&owned_id, visibility).await },
            )
            .await
            .inspect_err(|error| {
                tracing::warn!(chat_id, %error, "visibility change rolled back");
            })?;
        self.spawn_refresh();
        Ok(())
    }

    pub async fn rename(&self, chat_id: &str, title: &str) -> Result<(), StoreError> {
        let store = Arc::clone(&self.store);
        let owned_id = chat_id.to_string();
        let owned_title = title.to_string();
        self.cache
            .mutate(
                (chat_id.to_string(), ChatField::Title),
                ChatFieldValue::Title(title.to_string()),
                |_| async move { store.rename_chat(&owned_id, &owned_title).await },
            )
            .await
            .inspect_err(|error| {
                tracing::warn!(chat_id, %error, "rename rolled back");
            })?;
        self.spawn_refresh();
        Ok(())
    }

    /// Deletes remotely first; the local entry only disappears on success.
    pub async fn delete(&self, chat_id: &str) -> Result<(), StoreError> {
        self.store.delete_chat(chat_id).await?;
        lock(&self.records).retain(|record| record.id != chat_id);
        for field in [ChatField::Title, ChatField::Visibility] {
            self.cache.evict(&(chat_id.to_string(), field));
        }
        Ok(())
    }

    /// Waits for the background refresh started by the last successful edit.
    pub async fn settled(&self) {
        let task = lock(&self.refresh_task).take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn spawn_refresh(&self) {
        let store = Arc::clone(&self.store);
        let cache = self.cache.clone();
        let records = Arc::clone(&self.records);
        let task = tokio::spawn(async move {
            if let Err(error) = refresh_into(store.as_ref(), &cache, &records).await {
                tracing::warn!(%error, "background chat refresh failed");
            }
        });
        if let Some(previous) = lock(&self.refresh_task).replace(task) {
            previous.abort();
        }
    }
}

async fn refresh_into(
    store: &dyn ChatStore,
    cache: &OptimisticCache<ChatFieldKey, ChatFieldValue>,
    records: &Mutex<Vec<ChatRecord>>,
) -> Result<(), StoreError> {
    let chats = store.list_chats().await?;

    for record in &chats {
        cache.reconcile(
            (record.id.clone(), ChatField::Title),
            Some(ChatFieldValue::Title(record.title.clone())),
        );
        cache.reconcile(
            (record.id.clone(), ChatField::Visibility),
            Some(ChatFieldValue::Visibility(record.visibility)),
        );
    }
    for key in cache.keys() {
        if !chats.iter().any(|record| record.id == key.0) {
            cache.reconcile(key, None);
        }
    }

    tracing::debug!(count = chats.len(), "chat history refreshed");
    *lock(records) = chats;
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
