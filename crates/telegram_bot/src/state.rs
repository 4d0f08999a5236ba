//! Persistent bot state.
//!
//! The approval board and the balances pages are long-lived messages that
//! get edited in place. Their ids, plus the display names of the members the
//! bot has seen, survive restarts in a small JSON file.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use teloxide::types::MessageId;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BoardFile {
    pub approval_message: Option<i32>,
    #[serde(default)]
    pub balance_pages: Vec<i32>,
    /// Member id -> display name.
    #[serde(default)]
    pub names: HashMap<String, String>,
}

#[derive(Clone)]
pub(crate) struct BoardStore {
    path: PathBuf,
    inner: Arc<Mutex<BoardFile>>,
    /// Held while a board is re-rendered, so concurrent refreshes never
    /// post duplicate messages.
    render: Arc<Mutex<()>>,
}

impl BoardStore {
    pub(crate) fn load_or_empty(path: PathBuf) -> Self {
        let file = read_json_file(&path).unwrap_or_default();
        Self {
            path,
            inner: Arc::new(Mutex::new(file)),
            render: Arc::new(Mutex::new(())),
        }
    }

    pub(crate) async fn rendering(&self) -> MutexGuard<'_, ()> {
        self.render.lock().await
    }

    pub(crate) async fn approval_message(&self) -> Option<MessageId> {
        self.inner.lock().await.approval_message.map(MessageId)
    }

    pub(crate) async fn balance_pages(&self) -> Vec<MessageId> {
        self.inner
            .lock()
            .await
            .balance_pages
            .iter()
            .copied()
            .map(MessageId)
            .collect()
    }

    pub(crate) async fn names(&self) -> HashMap<String, String> {
        self.inner.lock().await.names.clone()
    }

    /// Remember a display name. Only writes when the name changed.
    pub(crate) async fn remember_name(&self, member_id: i64, name: &str) -> Result<(), String> {
        let key = member_id.to_string();
        {
            let guard = self.inner.lock().await;
            if guard.names.get(&key).is_some_and(|known| known == name) {
                return Ok(());
            }
        }
        self.update(|file| {
            file.names.insert(key, name.to_string());
        })
        .await
    }

    pub(crate) async fn update<F>(&self, f: F) -> Result<(), String>
    where
        F: FnOnce(&mut BoardFile),
    {
        let mut guard = self.inner.lock().await;
        f(&mut guard);
        write_json_file(&self.path, &guard).map_err(|e| format!("state save failed: {e}"))
    }
}

fn read_json_file(path: &Path) -> Option<BoardFile> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn write_json_file(path: &Path, file: &BoardFile) -> Result<(), std::io::Error> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(parent)?;

    let json = serde_json::to_string_pretty(file)
        .map_err(|_| std::io::Error::other("serialize failed"))?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(&tmp, path)?;
            let _ = fs::remove_file(&tmp);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("regear-bot-{}", uuid::Uuid::new_v4()))
            .join("state.json")
    }

    #[tokio::test]
    async fn board_ids_survive_reload() {
        let path = temp_path();
        let store = BoardStore::load_or_empty(path.clone());
        store
            .update(|file| {
                file.approval_message = Some(42);
                file.balance_pages = vec![7, 8];
            })
            .await
            .unwrap();
        store.remember_name(5, "Ana").await.unwrap();

        let reloaded = BoardStore::load_or_empty(path);
        assert_eq!(reloaded.approval_message().await, Some(MessageId(42)));
        assert_eq!(
            reloaded.balance_pages().await,
            vec![MessageId(7), MessageId(8)]
        );
        let names = reloaded.names().await;
        assert_eq!(names.get("5").map(String::as_str), Some("Ana"));
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn missing_or_corrupt_file_starts_empty() {
        let path = temp_path();
        let store = BoardStore::load_or_empty(path.clone());
        assert_eq!(store.approval_message().await, None);

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();
        let store = BoardStore::load_or_empty(path);
        assert!(store.balance_pages().await.is_empty());
    }
}
