//! File-based storage backend.
//!
//! Stores one JSON document per key under a base directory, giving simple
//! durable persistence without an external database.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// File-based storage implementation.
///
/// A key `namespace:id` maps to `<base>/<namespace>/<id>.json`. Writes go
/// through a temp file and a rename so a crash never leaves a
/// half-written document behind.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage instance with the specified base path.
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Splits a `namespace:id` key into a directory and file name.
	fn split_key(key: &str) -> (&str, &str) {
		match key.split_once(':') {
			Some((namespace, id)) => (namespace, id),
			None => ("", key),
		}
	}

	fn file_path(&self, key: &str) -> PathBuf {
		let (namespace, id) = Self::split_key(key);
		self.base_path.join(namespace).join(format!("{}.json", id))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.file_path(key);

		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		// Write atomically by writing to temp file then renaming.
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.file_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.file_path(key).exists())
	}

	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		// Prefixes come namespace-shaped ("namespace:" or "namespace:id...")
		// from the typed service.
		let (namespace, id_prefix) = match prefix.strip_suffix(':') {
			Some(namespace) => (namespace, ""),
			None => Self::split_key(prefix),
		};

		let dir = self.base_path.join(namespace);
		let mut entries = match fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let name = entry.file_name();
			let name = name.to_string_lossy();
			if let Some(id) = name.strip_suffix(".json") {
				if id.starts_with(id_prefix) {
					keys.push(format!("{}:{}", namespace, id));
				}
			}
		}

		Ok(keys)
	}
}
