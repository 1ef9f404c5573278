//! In-memory doubles for the distributed backend's dependencies

use crate::artifact::Location;
use crate::metadata::{MetadataEntry, MetadataRepository};
use crate::object::BucketConnector;
use crate::traits::{ByteStream, StorageError, StorageResult};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    CopyOptions, GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, ObjectStore,
    ObjectStoreExt, PutMultipartOptions, PutOptions, PutPayload, PutResult,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Drain a byte stream into a buffer.
pub async fn collect(stream: ByteStream) -> StorageResult<Vec<u8>> {
    let chunks: Vec<_> = stream.try_collect().await?;
    Ok(chunks.concat())
}

/// Key fragments that make writes or deletes fail.
#[derive(Debug, Default)]
struct Faults {
    put: Mutex<Option<String>>,
    delete: Mutex<Option<String>>,
}

impl Faults {
    fn matching(slot: &Mutex<Option<String>>, key: &str) -> bool {
        slot.lock()
            .unwrap()
            .as_deref()
            .is_some_and(|pattern| key.contains(pattern))
    }
}

fn simulated_failure(op: &str, location: &Path) -> object_store::Error {
    object_store::Error::Generic {
        store: "InMemoryConnector",
        source: format!("simulated {} failure at {}", op, location).into(),
    }
}

/// Bucket connector backed by `object_store::memory::InMemory`.
///
/// Clones share the same buckets and fault settings.
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    buckets: Arc<Mutex<HashMap<String, Arc<InMemory>>>>,
    provisioned: Arc<Mutex<HashMap<String, usize>>>,
    faults: Arc<Faults>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, name: &str) -> Option<Arc<InMemory>> {
        self.buckets.lock().unwrap().get(name).cloned()
    }

    /// How many times `bucket` was provisioned.
    pub fn provision_count(&self, bucket: &str) -> usize {
        self.provisioned
            .lock()
            .unwrap()
            .get(bucket)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of objects across all buckets.
    pub async fn object_count(&self) -> usize {
        let stores: Vec<_> = self.buckets.lock().unwrap().values().cloned().collect();
        let mut count = 0;
        for store in stores {
            let objects: Vec<_> = store.list(None).try_collect().await.unwrap();
            count += objects.len();
        }
        count
    }

    /// Fail every write whose key contains `pattern`.
    pub fn fail_puts_matching(&self, pattern: &str) {
        *self.faults.put.lock().unwrap() = Some(pattern.to_string());
    }

    /// Fail every delete whose key contains `pattern`.
    pub fn fail_deletes_matching(&self, pattern: &str) {
        *self.faults.delete.lock().unwrap() = Some(pattern.to_string());
    }

    pub fn clear_faults(&self) {
        *self.faults.put.lock().unwrap() = None;
        *self.faults.delete.lock().unwrap() = None;
    }

    /// Number of objects in `bucket`.
    pub async fn bucket_object_count(&self, bucket: &str) -> usize {
        match self.bucket(bucket) {
            Some(store) => {
                let objects: Vec<_> = store.list(None).try_collect().await.unwrap();
                objects.len()
            }
            None => 0,
        }
    }

    /// Delete a blob behind the adapter's back.
    pub async fn remove_object(&self, location: &Location) {
        if let Some(store) = self.bucket(&location.bucket) {
            store
                .delete(&Path::from(location.key.as_str()))
                .await
                .unwrap();
        }
    }
}

#[async_trait]
impl BucketConnector for InMemoryConnector {
    async fn provision(&self, bucket: &str) -> StorageResult<()> {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()));
        *self
            .provisioned
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    fn open(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        let store = self
            .bucket(bucket)
            .ok_or_else(|| StorageError::ConfigError(format!("Bucket not provisioned: {}", bucket)))?;
        Ok(Arc::new(FaultyStore {
            inner: store,
            faults: self.faults.clone(),
        }))
    }
}

/// `InMemory` wrapper that consults the connector's fault settings.
#[derive(Debug)]
struct FaultyStore {
    inner: Arc<InMemory>,
    faults: Arc<Faults>,
}

impl fmt::Display for FaultyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaultyStore({})", self.inner)
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn put_opts(
        &self,
        location: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> object_store::Result<PutResult> {
        if Faults::matching(&self.faults.put, location.as_ref()) {
            return Err(simulated_failure("put", location));
        }
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOptions,
    ) -> object_store::Result<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(&self, location: &Path, options: GetOptions) -> object_store::Result<GetResult> {
        self.inner.get_opts(location, options).await
    }

    fn delete_stream(
        &self,
        locations: BoxStream<'static, object_store::Result<Path>>,
    ) -> BoxStream<'static, object_store::Result<Path>> {
        let inner = self.inner.clone();
        let faults = self.faults.clone();
        locations
            .then(move |location| {
                let inner = inner.clone();
                let faults = faults.clone();
                async move {
                    let location = location?;
                    if Faults::matching(&faults.delete, location.as_ref()) {
                        return Err(simulated_failure("delete", &location));
                    }
                    inner.delete(&location).await?;
                    Ok::<Path, object_store::Error>(location)
                }
            })
            .boxed()
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'static, object_store::Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&Path>) -> object_store::Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy_opts(
        &self,
        from: &Path,
        to: &Path,
        options: CopyOptions,
    ) -> object_store::Result<()> {
        self.inner.copy_opts(from, to, options).await
    }
}

/// Metadata repository that keeps rows in a map.
///
/// Mirrors the transactional behaviour of the Postgres repository:
/// `create_all` inserts every row or none.
#[derive(Default)]
pub struct InMemoryMetadataRepository {
    rows: Arc<Mutex<HashMap<String, MetadataEntry>>>,
    fail_create_all: AtomicBool,
}

impl InMemoryMetadataRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create_all` fail with `Unavailable`.
    pub fn fail_create_all(&self, fail: bool) {
        self.fail_create_all.store(fail, Ordering::SeqCst);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl MetadataRepository for InMemoryMetadataRepository {
    async fn create_all(
        &self,
        video: MetadataEntry,
        manifest: MetadataEntry,
        chunks: Vec<MetadataEntry>,
    ) -> StorageResult<()> {
        if self.fail_create_all.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "metadata store unreachable".to_string(),
            ));
        }

        let mut rows = self.rows.lock().unwrap();
        let entries: Vec<_> = [video, manifest].into_iter().chain(chunks).collect();

        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if rows.contains_key(&entry.name) || !seen.insert(entry.name.as_str()) {
                return Err(StorageError::DuplicateName(entry.name.clone()));
            }
        }

        for entry in entries {
            rows.insert(entry.name.clone(), entry);
        }
        Ok(())
    }

    async fn read(&self, name: &str) -> StorageResult<Location> {
        self.rows
            .lock()
            .unwrap()
            .get(name)
            .map(|entry| entry.location.clone())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn delete(&self, name: &str) -> StorageResult<Location> {
        self.rows
            .lock()
            .unwrap()
            .remove(name)
            .map(|entry| entry.location)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn delete_all(&self, video: &str) -> StorageResult<Vec<Location>> {
        let mut rows = self.rows.lock().unwrap();
        let names: Vec<_> = rows
            .values()
            .filter(|entry| entry.owner == video)
            .map(|entry| entry.name.clone())
            .collect();

        let mut locations: Vec<_> = names
            .iter()
            .filter_map(|name| rows.remove(name))
            .map(|entry| entry.location)
            .collect();
        locations.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(locations)
    }
}
