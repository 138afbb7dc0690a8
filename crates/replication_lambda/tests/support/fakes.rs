use std::collections::HashMap;
use std::sync::Mutex;

use replication_core::contract::{ListingPage, ObjectRecord};
use replication_lambda::adapters::copier::{CopyError, CopyRequest, ObjectCopier};
use replication_lambda::adapters::listing::{ListingError, SourceListing};

/// Serves pre-built pages keyed by `page-N` continuation tokens.
pub struct PagedListing {
    pages: Vec<Vec<ObjectRecord>>,
    failing_page: Option<usize>,
    requests: Mutex<Vec<Option<String>>>,
}

impl PagedListing {
    pub fn new(pages: Vec<Vec<ObjectRecord>>) -> Self {
        Self {
            pages,
            failing_page: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![Vec::new()])
    }

    pub fn failing_at(mut self, page_index: usize) -> Self {
        self.failing_page = Some(page_index);
        self
    }

    pub fn requests(&self) -> Vec<Option<String>> {
        self.requests.lock().expect("poisoned mutex").clone()
    }
}

impl SourceListing for PagedListing {
    fn bucket(&self) -> &str {
        "source-bucket"
    }

    fn list_page(&self, continuation_token: Option<&str>) -> Result<ListingPage, ListingError> {
        self.requests
            .lock()
            .expect("poisoned mutex")
            .push(continuation_token.map(str::to_string));

        let index = match continuation_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|value| value.parse::<usize>().ok())
                .expect("fake tokens are page-N"),
        };

        if self.failing_page == Some(index) {
            return Err(ListingError {
                bucket: self.bucket().to_string(),
                message: "service unavailable".to_string(),
            });
        }

        let next_index = index + 1;
        Ok(ListingPage {
            objects: self.pages.get(index).cloned().unwrap_or_default(),
            next_continuation_token: (next_index < self.pages.len())
                .then(|| format!("page-{next_index}")),
        })
    }
}

/// Records every copy call in dispatch order and fails the configured keys.
#[derive(Default)]
pub struct RecordingCopier {
    calls: Mutex<Vec<(String, String)>>,
    failures: HashMap<String, CopyError>,
}

impl RecordingCopier {
    pub fn failing_on(mut self, source_key: &str, error: CopyError) -> Self {
        self.failures.insert(source_key.to_string(), error);
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("poisoned mutex").clone()
    }
}

impl ObjectCopier for RecordingCopier {
    fn copy_object(&self, request: &CopyRequest<'_>) -> Result<(), CopyError> {
        self.calls.lock().expect("poisoned mutex").push((
            request.source.key.clone(),
            request.destination_key.to_string(),
        ));
        match self.failures.get(&request.source.key) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
