/*!
 * Process Resources
 * Open-file and working-directory references duplicated on fork
 *
 * Only the interface shape the lifecycle manager needs: reference-counted
 * handles that fork duplicates and exit closes. Real file I/O lives
 * elsewhere.
 */

use std::sync::Arc;

/// A shared reference to an open file or directory.
#[derive(Debug, Clone)]
pub struct FileRef(Arc<str>);

impl FileRef {
    pub fn new(name: &str) -> Self {
        FileRef(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Per-process resource table: open files plus the current directory.
#[derive(Debug)]
pub struct Resources {
    files: Vec<FileRef>,
    cwd: Option<FileRef>,
}

impl Resources {
    /// The boot-time resource set: root cwd and the console streams.
    pub fn stdio() -> Self {
        Self {
            files: vec![FileRef::new("console"), FileRef::new("console")],
            cwd: Some(FileRef::new("/")),
        }
    }

    /// Duplicate every reference for a forked child.
    pub fn dup(&self) -> Self {
        Self {
            files: self.files.clone(),
            cwd: self.cwd.clone(),
        }
    }

    /// Drop every reference on exit.
    pub fn close_all(&mut self) {
        self.files.clear();
        self.cwd = None;
    }

    pub fn open_files(&self) -> usize {
        self.files.len()
    }
}
