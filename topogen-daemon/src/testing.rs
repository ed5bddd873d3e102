//! Scriptable metadata source for scheduler tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use topogen_core::{
    MetadataDocument, MetadataError, MetadataSource, MetadataVersion, RawContainer, RawHost,
    RawSelf, RawService,
};

pub(crate) struct CountingSource {
    version: Mutex<String>,
    version_calls: AtomicUsize,
    builds: AtomicUsize,
    fail_from_build: AtomicUsize,
    fail_until_build: AtomicUsize,
    doc: MetadataDocument,
}

impl CountingSource {
    pub(crate) fn new(version: &str) -> Self {
        Self {
            version: Mutex::new(version.to_string()),
            version_calls: AtomicUsize::new(0),
            builds: AtomicUsize::new(0),
            fail_from_build: AtomicUsize::new(usize::MAX),
            fail_until_build: AtomicUsize::new(0),
            doc: MetadataDocument::default(),
        }
    }

    pub(crate) fn set_version(&self, version: &str) {
        *self.version.lock().unwrap() = version.to_string();
    }

    /// Make every snapshot fetch fail (or succeed again).
    pub(crate) fn fail_fetches(&self, fail: bool) {
        let from = if fail { 0 } else { usize::MAX };
        self.fail_from_build.store(from, Ordering::SeqCst);
    }

    /// Let `n` snapshot builds succeed, then fail every later one.
    pub(crate) fn fail_after_builds(&self, n: usize) {
        self.fail_from_build
            .store(self.builds() + n, Ordering::SeqCst);
    }

    /// Fail the next `n` snapshot builds, then succeed.
    pub(crate) fn fail_first_builds(&self, n: usize) {
        self.fail_until_build
            .store(self.builds() + n, Ordering::SeqCst);
    }

    pub(crate) fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub(crate) fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }
}

impl MetadataSource for CountingSource {
    fn version(&self) -> Result<MetadataVersion, MetadataError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        Ok(MetadataVersion::from(self.version.lock().unwrap().as_str()))
    }

    // Every snapshot build starts here.
    fn services(&self) -> Result<Vec<RawService>, MetadataError> {
        let attempt = self.builds.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.fail_from_build.load(Ordering::SeqCst)
            || attempt < self.fail_until_build.load(Ordering::SeqCst)
        {
            return Err(MetadataError::Unreachable {
                url: "test://metadata".to_string(),
                attempts: 1,
            });
        }
        self.doc.services()
    }

    fn containers(&self) -> Result<Vec<RawContainer>, MetadataError> {
        self.doc.containers()
    }

    fn hosts(&self) -> Result<Vec<RawHost>, MetadataError> {
        self.doc.hosts()
    }

    fn self_container(&self) -> Result<RawSelf, MetadataError> {
        self.doc.self_container()
    }
}
