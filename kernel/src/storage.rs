//! Storage access used by the resolver.
//!
//! The resolver never talks to a filesystem directly. It asks a [`StorageHandler`] to list a
//! directory from a starting path and to read small files such as `_last_checkpoint`.
//! [`ObjectStoreStorage`] is the default handler over any `object_store` backend.

use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore};
use url::Url;

use crate::{DeltaResult, Error, FileMeta};

/// Listing and reading collaborator.
pub trait StorageHandler: Send + Sync {
    /// List every file in the directory containing `path` whose location sorts at or after
    /// `path` and strictly before `end_before` (when given), in ascending lexicographic order.
    fn list_from(&self, path: &Url, end_before: Option<&Url>) -> DeltaResult<Vec<FileMeta>>;

    /// Read a whole file. `Ok(None)` when the file does not exist.
    fn read(&self, location: &Url) -> DeltaResult<Option<Bytes>>;
}

/// [`StorageHandler`] backed by an [`ObjectStore`].
///
/// Calls block on the store's futures. Local filesystem listings are not ordered, so results
/// are always sorted before being returned.
#[derive(Debug, Clone)]
pub struct ObjectStoreStorage {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn meta_to_file_meta(&self, root: &Url, meta: ObjectMeta) -> DeltaResult<FileMeta> {
        let mut location = root.clone();
        location.set_path(&format!("/{}", meta.location.as_ref()));
        Ok(FileMeta {
            location,
            last_modified: meta.last_modified.timestamp_millis(),
            size: meta.size as u64,
        })
    }
}

impl StorageHandler for ObjectStoreStorage {
    fn list_from(&self, path: &Url, end_before: Option<&Url>) -> DeltaResult<Vec<FileMeta>> {
        let offset = Path::from_url_path(path.path())?;
        // A trailing slash means "everything in this directory".
        let prefix = if path.path().ends_with('/') {
            offset.clone()
        } else {
            let parent = path.join(".")?;
            Path::from_url_path(parent.path())?
        };
        let end = end_before
            .map(|end| Path::from_url_path(end.path()))
            .transpose()?;

        // list_with_offset is recursive and unordered on some stores: keep only direct
        // children below `end` while streaming, then sort what is left.
        let mut metas: Vec<ObjectMeta> = futures::executor::block_on(
            self.store
                .list_with_offset(Some(&prefix), &offset)
                .try_filter(|meta| {
                    let in_range = end.as_ref().is_none_or(|end| meta.location < *end)
                        && is_direct_child(&prefix, &meta.location);
                    futures::future::ready(in_range)
                })
                .try_collect::<Vec<_>>(),
        )?;
        metas.sort_by(|a, b| a.location.cmp(&b.location));

        metas
            .into_iter()
            .map(|meta| self.meta_to_file_meta(path, meta))
            .collect()
    }

    fn read(&self, location: &Url) -> DeltaResult<Option<Bytes>> {
        let path = Path::from_url_path(location.path())?;
        let result = futures::executor::block_on(async {
            match self.store.get(&path).await {
                Ok(get) => get.bytes().await.map(Some),
                Err(object_store::Error::NotFound { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        });
        result.map_err(Error::from)
    }
}

fn is_direct_child(prefix: &Path, location: &Path) -> bool {
    location
        .prefix_match(prefix)
        .is_some_and(|mut rest| rest.next().is_some() && rest.next().is_none())
}

impl From<object_store::path::Error> for Error {
    fn from(e: object_store::path::Error) -> Self {
        Error::storage(e)
    }
}
