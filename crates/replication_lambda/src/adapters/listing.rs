use replication_core::contract::ListingPage;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to list bucket '{bucket}': {message}")]
pub struct ListingError {
    pub bucket: String,
    pub message: String,
}

pub trait SourceListing {
    fn bucket(&self) -> &str;

    fn list_page(&self, continuation_token: Option<&str>) -> Result<ListingPage, ListingError>;
}

/// Lazy walk over a paginated listing. Each call to `next` fetches exactly
/// one page; the walk ends after the page that carries no continuation
/// token, or after the first error.
pub struct PageIter<'a, L: SourceListing + ?Sized> {
    listing: &'a L,
    continuation_token: Option<String>,
    finished: bool,
}

impl<'a, L: SourceListing + ?Sized> PageIter<'a, L> {
    pub fn new(listing: &'a L) -> Self {
        Self {
            listing,
            continuation_token: None,
            finished: false,
        }
    }
}

impl<L: SourceListing + ?Sized> Iterator for PageIter<'_, L> {
    type Item = Result<ListingPage, ListingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.listing.list_page(self.continuation_token.as_deref()) {
            Ok(page) => {
                match page.next_continuation_token.as_deref() {
                    Some(token) if !token.is_empty() => {
                        self.continuation_token = Some(token.to_string());
                    }
                    _ => self.finished = true,
                }
                Some(Ok(page))
            }
            Err(error) => {
                self.finished = true;
                Some(Err(error))
            }
        }
    }
}
