use url::Url;

use crate::config::ApiConfig;
use crate::event::ListKind;
use crate::model::CampId;
use crate::paging::PageRequest;
use crate::RemoteError;

pub const MAX_URL_LENGTH: usize = 2048;

/// Builds request URLs for the camping API from [`ApiConfig`].
#[derive(Debug, Clone, Copy)]
pub struct Endpoints<'a> {
    config: &'a ApiConfig,
}

impl<'a> Endpoints<'a> {
    pub fn new(config: &'a ApiConfig) -> Self {
        Self { config }
    }

    /// Page query: `page`, `size`, then every non-empty filter criterion.
    pub fn page_url(&self, list: ListKind, request: &PageRequest) -> Result<Url, RemoteError> {
        let path = match list {
            ListKind::Search => &self.config.search_path,
            ListKind::Bookmarks => &self.config.bookmarks_path,
        };
        let mut url = self.join(path)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page", &request.cursor.to_string());
            query.append_pair("size", &request.page_size.to_string());
            for (key, value) in request.filter.iter().filter(|(_, v)| !v.is_empty()) {
                query.append_pair(key, value);
            }
        }
        Self::bounded(url)
    }

    pub fn toggle_url(&self, id: CampId) -> Result<Url, RemoteError> {
        let path = self
            .config
            .bookmark_toggle_path
            .replace("{id}", &id.to_string());
        self.join(&path).and_then(Self::bounded)
    }

    fn join(&self, path: &str) -> Result<Url, RemoteError> {
        Url::parse(&self.config.base_url)
            .and_then(|base| base.join(path))
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))
    }

    fn bounded(url: Url) -> Result<Url, RemoteError> {
        if url.as_str().len() > MAX_URL_LENGTH {
            return Err(RemoteError::InvalidUrl(format!(
                "URL exceeds maximum length of {MAX_URL_LENGTH} bytes"
            )));
        }
        Ok(url)
    }
}
