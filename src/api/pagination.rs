//! Eager collection of paginated resources.

use serde::de::DeserializeOwned;

use super::models::Page;
use super::transport::Transport;
use crate::error::CvatError;

/// A typed server resource, named for error messages.
pub trait ApiResource: DeserializeOwned {
    const KIND: &'static str;
}

/// Fetches every page of a collection and checks the declared total.
///
/// Pages are requested one at a time: the URL of page N+1 is only known
/// once page N has arrived.
pub struct PagedFetcher<'a, T: Transport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: Transport + ?Sized> PagedFetcher<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Collect all items of the collection at `url`.
    ///
    /// `params` apply to the first request only; `next` links already carry
    /// their query. Fails with [`CvatError::PageCountMismatch`] when the
    /// number of collected items differs from the server's `count`.
    pub fn fetch_all<R: ApiResource>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<R>, CvatError> {
        let first: Page<R> = get_page(self.transport, url, params)?;
        let expected = first.count;
        let mut items = first.results;
        let mut next = first.next;
        let mut pages = 1usize;

        while let Some(next_url) = next {
            let page: Page<R> = get_page(self.transport, &next_url, &[])?;
            items.extend(page.results);
            next = page.next;
            pages += 1;
        }

        log::debug!(
            "Fetched {} {}(s) from {url} in {pages} page(s)",
            items.len(),
            R::KIND
        );

        if items.len() != expected {
            return Err(CvatError::PageCountMismatch {
                url: url.to_string(),
                expected,
                actual: items.len(),
            });
        }

        Ok(items)
    }
}

fn get_page<T, R>(transport: &T, url: &str, params: &[(&str, &str)]) -> Result<Page<R>, CvatError>
where
    T: Transport + ?Sized,
    R: ApiResource,
{
    let response = transport.get(url, params)?;
    if !response.is_success() {
        return Err(CvatError::HttpStatus {
            url: url.to_string(),
            status: response.status,
            body: response.body_text(),
        });
    }
    serde_json::from_slice(&response.body).map_err(|source| CvatError::Decode {
        resource: R::KIND,
        url: url.to_string(),
        source,
    })
}
