//! Folder hierarchy manager over a filesystem-backed document store.
//! Each folder is one JSON document on disk; every operation re-reads the
//! documents it needs, so the store is the source of truth on every call.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};


/// Title given to the folder created by [`FolderStore::initialize`].
pub const ROOT_TITLE: &str = "root";

/// One folder document. The parent link is never stored; it is derived by
/// searching for the folder whose `children` set lists this id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderRecord {
    pub id: Uuid,
    pub title: String,
    pub owner: String,
    #[serde(default)]
    pub children: Vec<Uuid>,
    #[serde(default)]
    pub items: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl FolderRecord {
    fn new(title: &str, owner: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            owner: owner.to_string(),
            children: Vec::new(),
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Single-collection document store: one `<id>.json` per folder under a
/// data directory. Writes go through a temp file and a rename, so each
/// document update is atomic on its own; nothing spans documents.
struct DocStore {
    dir: PathBuf,
}

impl DocStore {
    fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read(&self, id: Uuid) -> Result<Option<FolderRecord>> {
        let data = match std::fs::read(self.path(id)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let rec = serde_json::from_slice(&data).map_err(|e| Error::Corrupt {
            id,
            reason: e.to_string(),
        })?;
        Ok(Some(rec))
    }

    fn write(&self, rec: &FolderRecord) -> Result<()> {
        let data = serde_json::to_vec(rec).map_err(|e| Error::Corrupt {
            id: rec.id,
            reason: e.to_string(),
        })?;
        let tmp = self.dir.join(format!(".tmp-{}", rec.id));
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, self.path(rec.id))?;
        Ok(())
    }

    fn remove(&self, id: Uuid) -> Result<()> {
        match std::fs::remove_file(self.path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read every folder document in the collection. Entries that are not
    /// folder documents, or that no longer parse, are skipped with a warning
    /// rather than failing the whole scan.
    fn scan(&self) -> Result<Vec<FolderRecord>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(id) = Uuid::parse_str(stem) else {
                continue;
            };
            match self.read(id) {
                Ok(Some(rec)) => out.push(rec),
                Ok(None) => {}
                Err(e) => tracing::warn!(%id, error = %e, "skipping unreadable folder document"),
            }
        }
        Ok(out)
    }
}

/// The folder hierarchy manager: a persistent forest with one rooted tree
/// per user. All preconditions are checked against the store at call time.
pub struct FolderStore {
    docs: DocStore,
}

impl FolderStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            docs: DocStore::new(dir)?,
        })
    }

    /// Directory where folder documents are persisted.
    pub fn data_dir(&self) -> &Path {
        &self.docs.dir
    }

    /// Create the root folder for a user who has none yet.
    ///
    /// Fails with [`Error::AlreadyInitialized`] if the user owns any folder,
    /// root or otherwise.
    pub fn initialize(&self, user: &str) -> Result<Uuid> {
        if self.docs.scan()?.iter().any(|r| r.owner == user) {
            return Err(Error::AlreadyInitialized(user.to_string()));
        }
        let root = FolderRecord::new(ROOT_TITLE, user);
        self.docs.write(&root)?;
        tracing::debug!(user, id = %root.id, "initialized folder tree");
        Ok(root.id)
    }

    /// Create a folder under an existing parent owned by the same user.
    ///
    /// The child document is written before the parent links to it, so a
    /// concurrent reader never observes a dangling child reference.
    pub fn create(&self, user: &str, title: &str, parent: Uuid) -> Result<Uuid> {
        let mut parent_rec = self
            .docs
            .read(parent)?
            .ok_or(Error::ParentNotFound(parent))?;
        if parent_rec.owner != user {
            return Err(Error::NotOwner {
                folder: parent,
                user: user.to_string(),
            });
        }
        let child = FolderRecord::new(title, user);
        self.docs.write(&child)?;
        if !parent_rec.children.contains(&child.id) {
            parent_rec.children.push(child.id);
        }
        self.docs.write(&parent_rec)?;
        Ok(child.id)
    }

    /// Re-parent `folder` under `new_parent`, carrying its whole subtree.
    ///
    /// Preconditions are checked in order, first failure wins: both folders
    /// exist, owners match, the move is not into itself, and the destination
    /// is not a descendant of the folder being moved.
    pub fn move_folder(&self, folder: Uuid, new_parent: Uuid) -> Result<()> {
        let folder_rec = self
            .docs
            .read(folder)?
            .ok_or(Error::FolderNotFound(folder))?;
        let parent_rec = self
            .docs
            .read(new_parent)?
            .ok_or(Error::FolderNotFound(new_parent))?;
        if folder_rec.owner != parent_rec.owner {
            return Err(Error::OwnerMismatch { folder, new_parent });
        }
        if folder == new_parent {
            return Err(Error::SelfMove(folder));
        }
        if self.descendant_ids(folder)?.contains(&new_parent) {
            return Err(Error::CycleDetected { folder, new_parent });
        }

        // Detach from the current parent, if any. A parentless folder being
        // attached for the first time is not an error.
        if let Some(mut old_parent) = self.parent_of(folder)? {
            old_parent.children.retain(|c| *c != folder);
            self.docs.write(&old_parent)?;
        }
        let mut dest = parent_rec;
        if !dest.children.contains(&folder) {
            dest.children.push(folder);
        }
        self.docs.write(&dest)?;
        Ok(())
    }

    /// Delete a folder and its entire descendant subtree. Items held by any
    /// deleted folder cease to be referenced; the external item owner is not
    /// consulted.
    pub fn delete(&self, folder: Uuid) -> Result<()> {
        if self.docs.read(folder)?.is_none() {
            return Err(Error::FolderNotFound(folder));
        }
        let doomed = self.descendant_ids(folder)?;
        tracing::debug!(%folder, count = doomed.len(), "deleting folder subtree");
        for id in &doomed {
            self.docs.remove(*id)?;
        }
        if let Some(mut parent) = self.parent_of(folder)? {
            parent.children.retain(|c| *c != folder);
            self.docs.write(&parent)?;
        }
        Ok(())
    }

    /// Place an item into a folder, removing it from wherever it currently
    /// lives. Inserting an item into the folder that already holds it is a
    /// no-op success.
    pub fn insert_item(&self, item: &str, folder: Uuid) -> Result<()> {
        let mut dest = self
            .docs
            .read(folder)?
            .ok_or(Error::FolderNotFound(folder))?;
        if dest.items.iter().any(|i| i == item) {
            return Ok(());
        }
        // The search is global, not scoped to one owner: an item lives in at
        // most one folder anywhere in the collection.
        if let Some(mut holder) = self.holder_of(item)? {
            holder.items.retain(|i| i != item);
            self.docs.write(&holder)?;
        }
        dest.items.push(item.to_string());
        self.docs.write(&dest)?;
        Ok(())
    }

    /// Remove an item from whichever folder currently holds it.
    pub fn delete_item(&self, item: &str) -> Result<()> {
        let mut holder = self
            .holder_of(item)?
            .ok_or_else(|| Error::ItemNotFound(item.to_string()))?;
        holder.items.retain(|i| i != item);
        self.docs.write(&holder)?;
        Ok(())
    }

    /// Direct child folder ids.
    pub fn children(&self, folder: Uuid) -> Result<Vec<Uuid>> {
        Ok(self.details(folder)?.children)
    }

    /// Direct item ids.
    pub fn items(&self, folder: Uuid) -> Result<Vec<String>> {
        Ok(self.details(folder)?.items)
    }

    /// Full folder record.
    pub fn details(&self, folder: Uuid) -> Result<FolderRecord> {
        self.docs
            .read(folder)?
            .ok_or(Error::FolderNotFound(folder))
    }

    /// The user's root folder id, if the user is initialized: the folder
    /// they own that no other folder lists as a child.
    pub fn root(&self, user: &str) -> Result<Option<Uuid>> {
        let all = self.docs.scan()?;
        let child_ids: HashSet<Uuid> = all.iter().flat_map(|r| r.children.iter().copied()).collect();
        Ok(all
            .iter()
            .find(|r| r.owner == user && !child_ids.contains(&r.id))
            .map(|r| r.id))
    }

    /// The folder currently holding `item`, if any.
    pub fn locate_item(&self, item: &str) -> Result<Option<Uuid>> {
        Ok(self.holder_of(item)?.map(|r| r.id))
    }

    /// Ids of `folder` and every folder reachable from it via `children`
    /// links. Traversal is breadth-first with a visited set, so it stays
    /// terminating even if the persisted structure is already cyclic.
    pub fn descendant_ids(&self, folder: Uuid) -> Result<Vec<Uuid>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([folder]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            if let Some(rec) = self.docs.read(id)? {
                queue.extend(rec.children.iter().copied());
            }
        }
        Ok(out)
    }

    fn parent_of(&self, folder: Uuid) -> Result<Option<FolderRecord>> {
        Ok(self
            .docs
            .scan()?
            .into_iter()
            .find(|r| r.children.contains(&folder)))
    }

    fn holder_of(&self, item: &str) -> Result<Option<FolderRecord>> {
        Ok(self
            .docs
            .scan()?
            .into_iter()
            .find(|r| r.items.iter().any(|i| i == item)))
    }
}
