//! Cloud object storage backend.
//!
//! Speaks the Google Cloud Storage JSON API (also implemented by common emulators):
//!
//! | Operation | Request |
//! |-----------|---------|
//! | put       | `POST {endpoint}/upload/storage/v1/b/{bucket}/o?uploadType=media&name={key}` |
//! | exists    | `GET {endpoint}/storage/v1/b/{bucket}/o/{key}` (404 = absent) |
//! | get       | `GET {endpoint}/storage/v1/b/{bucket}/o/{key}?alt=media` |
//! | delete    | `DELETE {endpoint}/storage/v1/b/{bucket}/o/{key}` (404 = already gone) |
//! | list      | `GET {endpoint}/storage/v1/b/{bucket}/o?prefix={entity_id}/` |
//!
//! `{key}` is the `{entity_id}/{filename}` object name, percent-encoded as one path segment.

use crate::{normalise_base_url, FilesError, FilesResult, ObjectPath, ObjectStore};
use catalog_types::StoredFilename;
use catalog_uuid::EntityId;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectListing {
    #[serde(default)]
    items: Vec<ListedObject>,
    next_page_token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ListedObject {
    name: String,
}

/// Object store backed by a bucket behind an HTTP JSON API.
#[derive(Debug)]
pub struct CloudObjectStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    access_token: Option<String>,
    base_url: String,
}

impl CloudObjectStore {
    /// Creates a client for `bucket` at `api_endpoint`. No request is made.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidConfig`] for an empty bucket or an endpoint that is not an
    /// absolute http(s) URL, and [`FilesError::Http`] if the HTTP client cannot be built.
    pub fn new(
        bucket: &str,
        api_endpoint: &str,
        access_token: Option<String>,
    ) -> FilesResult<Self> {
        let bucket = bucket.trim();
        if bucket.is_empty() || bucket.contains('/') {
            return Err(FilesError::InvalidConfig(format!(
                "bucket name '{}' is not usable",
                bucket
            )));
        }

        let endpoint = Url::parse(api_endpoint.trim()).map_err(|e| {
            FilesError::InvalidConfig(format!("api endpoint '{}': {}", api_endpoint, e))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(FilesError::InvalidConfig(format!(
                "api endpoint '{}' must be an http(s) URL",
                api_endpoint
            )));
        }

        let base_url = normalise_base_url(&format!(
            "{}/{}",
            endpoint.as_str().trim_end_matches('/'),
            bucket
        ));

        Ok(Self {
            client: Client::builder().build()?,
            endpoint,
            bucket: bucket.to_owned(),
            access_token,
            base_url,
        })
    }

    fn api_url(&self, segments: &[&str]) -> FilesResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                FilesError::InvalidConfig(format!("endpoint {} cannot be a base", self.endpoint))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, path: &ObjectPath) -> FilesResult<Url> {
        let key = path.key();
        self.api_url(&["storage", "v1", "b", &self.bucket, "o", &key])
    }

    fn upload_url(&self, path: &ObjectPath) -> FilesResult<Url> {
        let mut url = self.api_url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &path.key());
        Ok(url)
    }

    fn list_url(&self, entity_id: EntityId, page_token: Option<&str>) -> FilesResult<Url> {
        let mut url = self.api_url(&["storage", "v1", "b", &self.bucket, "o"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("prefix", &format!("{}/", entity_id));
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    fn authorised(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn expect_success(response: Response) -> FilesResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(FilesError::UnexpectedStatus {
            status: response.status().as_u16(),
            url: response.url().to_string(),
        })
    }
}

impl ObjectStore for CloudObjectStore {
    fn put(&self, path: &ObjectPath, content: &[u8]) -> FilesResult<ObjectPath> {
        let url = self.upload_url(path)?;
        let response = self
            .authorised(self.client.post(url))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content.to_vec())
            .send()?;
        Self::expect_success(response)?;

        tracing::debug!(object = %path, size = content.len(), bucket = %self.bucket, "cloud store: put");
        Ok(path.clone())
    }

    fn get(&self, path: &ObjectPath) -> FilesResult<Vec<u8>> {
        let mut url = self.object_url(path)?;
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self.authorised(self.client.get(url)).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(FilesError::NotFound(path.key()));
        }
        let bytes = Self::expect_success(response)?.bytes()?;
        Ok(bytes.to_vec())
    }

    fn delete(&self, path: &ObjectPath) -> FilesResult<()> {
        let url = self.object_url(path)?;
        let response = self.authorised(self.client.delete(url)).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(object = %path, "cloud store: delete of missing object");
            return Ok(());
        }
        Self::expect_success(response)?;

        tracing::debug!(object = %path, bucket = %self.bucket, "cloud store: delete");
        Ok(())
    }

    fn exists(&self, path: &ObjectPath) -> FilesResult<bool> {
        let url = self.object_url(path)?;
        let response = self.authorised(self.client.get(url)).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::expect_success(response)?;
        Ok(true)
    }

    fn list(&self, entity_id: EntityId) -> FilesResult<Vec<StoredFilename>> {
        let prefix = format!("{}/", entity_id);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.list_url(entity_id, page_token.as_deref())?;
            let response = self.authorised(self.client.get(url)).send()?;
            let listing: ObjectListing = Self::expect_success(response)?.json()?;

            for object in listing.items {
                let Some(name) = object.name.strip_prefix(&prefix) else {
                    continue;
                };
                // Nested keys are not objects of this namespace.
                if name.contains('/') {
                    continue;
                }
                let name = StoredFilename::new(name)
                    .map_err(|e| FilesError::InvalidPath(format!("{}: {}", object.name, e)))?;
                names.push(name);
            }

            match listing.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        names.sort();
        Ok(names)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
