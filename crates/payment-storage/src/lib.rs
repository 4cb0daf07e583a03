//! Storage abstractions for the payment orchestrator.
//!
//! The orchestrator only ever sees the narrow save/get/find contract
//! provided by [`StorageService`]; the byte-level [`StorageInterface`]
//! underneath may be backed by memory, the filesystem, or anything else
//! that upserts durably before returning.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

pub use implementations::file::FileStorage;
pub use implementations::memory::MemoryStorage;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// A requested item does not exist.
	#[error("Not found")]
	NotFound,
	/// Serialization or deserialization failed.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// The storage backend failed.
	#[error("Backend error: {0}")]
	Backend(String),
}

/// Low-level interface every storage backend must implement.
///
/// Keys are opaque strings; the typed service above composes them as
/// `namespace:id`. `set_bytes` upserts and must be durable before it
/// returns — callers never re-verify a save.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, replacing any existing value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key, if any.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists every key starting with the given prefix.
	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// High-level storage service that provides typed operations.
///
/// Wraps a byte-level backend with JSON (de)serialization and namespace
/// keying, giving collaborators the save/get/find contract they expect.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Upserts a serializable value under `namespace:id`.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&Self::key(namespace, id), bytes).await
	}

	/// Retrieves and deserializes a value, failing with `NotFound` when
	/// the key is absent.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Retrieves a value, mapping absence to `None` instead of an error.
	pub async fn retrieve_opt<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Scans a namespace and returns every value matching the predicate.
	pub async fn find<T, F>(&self, namespace: &str, predicate: F) -> Result<Vec<T>, StorageError>
	where
		T: DeserializeOwned,
		F: Fn(&T) -> bool,
	{
		let prefix = format!("{}:", namespace);
		let mut matches = Vec::new();

		for key in self.backend.keys(&prefix).await? {
			// A key deleted between the scan and the read is not an error.
			let bytes = match self.backend.get_bytes(&key).await {
				Ok(bytes) => bytes,
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			};
			let value: T = serde_json::from_slice(&bytes)
				.map_err(|e| StorageError::Serialization(e.to_string()))?;
			if predicate(&value) {
				matches.push(value);
			}
		}

		Ok(matches)
	}

	/// Removes a value from storage.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	/// Checks whether `namespace:id` exists.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Deserialize;

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Record {
		id: String,
		tag: String,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_store_and_retrieve() {
		let storage = service();
		let record = Record {
			id: "1".into(),
			tag: "a".into(),
		};

		storage.store("records", &record.id, &record).await.unwrap();
		let back: Record = storage.retrieve("records", "1").await.unwrap();
		assert_eq!(back, record);
	}

	#[tokio::test]
	async fn test_retrieve_missing_is_not_found() {
		let storage = service();
		let result = storage.retrieve::<Record>("records", "missing").await;
		assert!(matches!(result, Err(StorageError::NotFound)));
		assert_eq!(
			storage.retrieve_opt::<Record>("records", "missing").await.unwrap(),
			None
		);
	}

	#[tokio::test]
	async fn test_store_upserts() {
		let storage = service();
		let mut record = Record {
			id: "1".into(),
			tag: "a".into(),
		};
		storage.store("records", "1", &record).await.unwrap();
		record.tag = "b".into();
		storage.store("records", "1", &record).await.unwrap();

		let back: Record = storage.retrieve("records", "1").await.unwrap();
		assert_eq!(back.tag, "b");
	}

	#[tokio::test]
	async fn test_find_filters_within_namespace() {
		let storage = service();
		for (id, tag) in [("1", "x"), ("2", "y"), ("3", "x")] {
			let record = Record {
				id: id.into(),
				tag: tag.into(),
			};
			storage.store("records", id, &record).await.unwrap();
		}
		// Same id in another namespace must not leak into the scan.
		storage
			.store("other", "1", &Record { id: "1".into(), tag: "x".into() })
			.await
			.unwrap();

		let found: Vec<Record> = storage
			.find("records", |r: &Record| r.tag == "x")
			.await
			.unwrap();
		assert_eq!(found.len(), 2);
	}
}
