//! # Database Facade
//!
//! One `Database` owns one file. Opening a path that does not exist creates
//! a fresh database: the 4-byte format version followed by an empty master
//! page. Opening an existing path verifies the version, loads the first
//! master page, and scans the master chain into an in-memory directory of
//! collection names.
//!
//! ## Ownership
//!
//! The database owns the file handle and the loaded master page. Collection
//! handles borrow the database mutably, so exactly one collection can be
//! operated on at a time and the single-writer model of the format is
//! enforced by the borrow checker rather than by locks. Body pages are
//! loaded on demand per traversal and never cached.
//!
//! ## Usage
//!
//! ```ignore
//! use kistdb::{Database, Document};
//!
//! let mut db = Database::open("/tmp/db1")?;
//! let mut kaas = db.make_collection("kaas")?;
//! kaas.append(&Document::builder().field("awesome", true)?.finish())?;
//! assert_eq!(kaas.count()?, 1);
//! ```

mod collection;

pub use collection::{Collection, Documents};

use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use hashbrown::HashMap;

use crate::encoding;
use crate::error::StoreError;
use crate::storage::{
    CollectionHeaderPage, DbFile, MasterPage, PageReference, PageSize, PageType, CURRENT_VERSION,
    FILE_VERSION_SIZE,
};

#[derive(Debug)]
pub struct Database {
    file: DbFile,
    master: MasterPage,
    path: PathBuf,
    directory: HashMap<String, PageReference>,
}

impl Database {
    /// Opens the database at `path`, creating it when the file does not
    /// exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open_existing(path)
        } else {
            Self::create(path)
        }
    }

    fn create(path: &Path) -> Result<Self> {
        let mut file = DbFile::create(path)?;
        file.append(&CURRENT_VERSION.to_le_bytes())?;

        let mut master = MasterPage::new();
        let position = file.append(master.bytes())?;
        master.set_position(position);

        tracing::debug!(path = %path.display(), "created database file");
        Ok(Self {
            file,
            master,
            path: path.to_path_buf(),
            directory: HashMap::new(),
        })
    }

    fn open_existing(path: &Path) -> Result<Self> {
        let mut file = DbFile::open(path)?;

        let prefix = file.read_exact(0, FILE_VERSION_SIZE)?;
        let version = encoding::read_u32(&prefix, 0)?;
        ensure!(version == CURRENT_VERSION, StoreError::InvalidFileStructure);

        let master = MasterPage::load(&mut file, FILE_VERSION_SIZE as u64, PageSize::Small)
            .wrap_err("failed to load the first master page")?;
        let directory = Self::scan_directory(&mut file, &master)?;

        tracing::debug!(
            path = %path.display(),
            collections = directory.len(),
            "opened database file"
        );
        Ok(Self {
            file,
            master,
            path: path.to_path_buf(),
            directory,
        })
    }

    /// Walks the whole master chain and resolves every directory entry to
    /// its collection header page. A directory entry referencing anything
    /// but a header page fails with `InvalidPage`.
    fn scan_directory(
        file: &mut DbFile,
        first: &MasterPage,
    ) -> Result<HashMap<String, PageReference>> {
        let mut entries: Vec<PageReference> = first.entries().collect();
        let mut next = first.next_reference();
        while let Some(reference) = next {
            let master = MasterPage::load(file, reference.position, reference.size)?;
            entries.extend(master.entries());
            next = master.next_reference();
        }

        let mut directory = HashMap::with_capacity(entries.len());
        for entry in entries {
            let header = CollectionHeaderPage::resolve(file, &entry)?;
            directory.insert(header.name().to_string(), entry);
        }
        Ok(directory)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates a new, empty collection and registers it in the master
    /// directory. The name must be non-empty, unique, and at most 255
    /// bytes.
    pub fn make_collection(&mut self, name: &str) -> Result<Collection<'_>> {
        ensure!(!name.is_empty(), "collection name must not be empty");
        ensure!(
            !self.directory.contains_key(name),
            "collection '{name}' already exists"
        );

        let mut header = CollectionHeaderPage::new(name)?;
        self.master.append(&mut self.file, &mut header)?;

        let reference = PageReference {
            size: header.size(),
            page_type: PageType::CollectionHeader,
            position: header.position(),
        };
        self.directory.insert(name.to_string(), reference);
        tracing::debug!(collection = name, position = header.position(), "created collection");
        Ok(Collection::new(self, header))
    }

    /// Opens an existing collection by name.
    pub fn collection(&mut self, name: &str) -> Result<Option<Collection<'_>>> {
        let Some(&reference) = self.directory.get(name) else {
            return Ok(None);
        };
        let header = CollectionHeaderPage::resolve(&mut self.file, &reference)?;
        Ok(Some(Collection::new(self, header)))
    }

    /// Names of all collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.directory.keys().cloned().collect();
        names.sort();
        names
    }

    /// Page lookup by number. Only the master page (number 0) is
    /// addressable; other numbers are reserved for a future page index.
    pub fn read_page(&self, number: u32) -> Option<&MasterPage> {
        (number == 0).then_some(&self.master)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_version_and_master_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh.db");
        let db = Database::open(&path).unwrap();

        assert_eq!(db.read_page(0).unwrap().position(), 4);
        assert!(db.read_page(1).is_none());

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw.len(), 1004);
        assert_eq!(&raw[..4], &1u32.to_le_bytes());
        assert_eq!(raw[4], PageSize::Small as u8);
        assert_eq!(raw[5], PageType::Master as u8);
    }

    #[test]
    fn reopen_finds_existing_collections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let mut db = Database::open(&path).unwrap();
            db.make_collection("kaas").unwrap();
            db.make_collection("worst").unwrap();
        }

        let mut db = Database::open(&path).unwrap();
        assert_eq!(db.collection_names(), vec!["kaas", "worst"]);
        assert!(db.collection("kaas").unwrap().is_some());
        assert!(db.collection("hagelslag").unwrap().is_none());
    }

    #[test]
    fn duplicate_collection_names_are_rejected() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path().join("t.db")).unwrap();
        db.make_collection("kaas").unwrap();

        assert!(db.make_collection("kaas").is_err());
    }

    #[test]
    fn empty_collection_name_is_rejected() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path().join("t.db")).unwrap();

        assert!(db.make_collection("").is_err());
    }

    #[test]
    fn unknown_version_fails_with_invalid_file_structure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        Database::open(&path).unwrap();

        let mut raw = std::fs::read(&path).unwrap();
        raw[0] = 9;
        std::fs::write(&path, &raw).unwrap();

        let err = Database::open(&path).unwrap_err();
        assert_eq!(
            StoreError::kind(&err),
            Some(&StoreError::InvalidFileStructure)
        );
    }

    #[test]
    fn truncated_master_page_fails_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        Database::open(&path).unwrap();

        let raw = std::fs::read(&path).unwrap();
        std::fs::write(&path, &raw[..500]).unwrap();

        let err = Database::open(&path).unwrap_err();
        assert_eq!(
            StoreError::kind(&err),
            Some(&StoreError::InvalidFileStructure)
        );
    }

    #[test]
    fn open_rejects_unwritable_location() {
        let dir = tempdir().unwrap();

        // A directory path is not a database file.
        let err = Database::open(dir.path()).unwrap_err();
        assert!(matches!(
            StoreError::kind(&err),
            Some(StoreError::NotAccessible(_))
        ));
    }
}
