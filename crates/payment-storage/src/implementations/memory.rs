//! In-memory storage backend.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory storage implementation.
///
/// Used by tests and as a development backend; data does not survive a
/// process restart.
#[derive(Default)]
pub struct MemoryStorage {
	data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.data
			.read()
			.await
			.get(key)
			.cloned()
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		self.data.write().await.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.data.write().await.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.data.read().await.contains_key(key))
	}

	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		Ok(self
			.data
			.read()
			.await
			.keys()
			.filter(|k| k.starts_with(prefix))
			.cloned()
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_memory_storage_round_trip() {
		let storage = MemoryStorage::new();

		storage.set_bytes("a:1", vec![1, 2, 3]).await.unwrap();
		assert_eq!(storage.get_bytes("a:1").await.unwrap(), vec![1, 2, 3]);
		assert!(storage.exists("a:1").await.unwrap());

		storage.delete("a:1").await.unwrap();
		assert!(!storage.exists("a:1").await.unwrap());
		assert!(matches!(
			storage.get_bytes("a:1").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_keys_by_prefix() {
		let storage = MemoryStorage::new();
		storage.set_bytes("a:1", vec![1]).await.unwrap();
		storage.set_bytes("a:2", vec![2]).await.unwrap();
		storage.set_bytes("b:1", vec![3]).await.unwrap();

		let mut keys = storage.keys("a:").await.unwrap();
		keys.sort();
		assert_eq!(keys, vec!["a:1", "a:2"]);
	}
}
