//! HTTP Resource Gateway
//!
//! Implements `ResourceGateway` against the file-manager REST API.
//!
//! Auth: `Authorization: Bearer {token}` on every call (share access may be anonymous)
//! Pagination: offset-based (`limit` + `offset`)
//! Absent folder ids travel as the literal string `null`

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{
    Breadcrumb, FileEntry, FileUpload, FileVersion, FolderEntry, ListingQuery, MutationKind,
    MutationMethod, ResourceGateway, SearchQuery, SearchResults, ShareRequest, SharedResource,
    StorageUsage,
};
use crate::config::ClientConfig;
use crate::error::{sanitize_api_error, ClientError};

/// Value sent for "no folder" in listing and search queries
const NULL_FOLDER: &str = "null";

fn gateway_log(msg: &str) {
    info!("[GATEWAY] {}", msg);
}

#[derive(Debug, Deserialize)]
struct ShareLinkResponse {
    link: Option<String>,
}

pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let base = Url::parse(config.api_url.trim())
            .map_err(|e| ClientError::InvalidConfig(format!("Invalid API URL: {}", e)))?;

        let mut default_headers = reqwest::header::HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| ClientError::InvalidConfig(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            base_url: base.as_str().trim_end_matches('/').to_string(),
            client,
        })
    }

    // ─── Helpers ─────────────────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ClientError::InvalidConfig(format!("Invalid endpoint {}: {}", path, e)))
    }

    fn bearer(token: &SecretString) -> Result<HeaderValue, ClientError> {
        let raw = token.expose_secret();
        if raw.trim().is_empty() {
            return Err(ClientError::AuthMissing);
        }
        HeaderValue::from_str(&format!("Bearer {}", raw))
            .map_err(|e| ClientError::Validation(format!("Invalid characters in access token: {}", e)))
    }

    fn listing_url(&self, path: &str, folder_param: Option<&str>, query: &ListingQuery) -> Result<Url, ClientError> {
        let mut url = self.endpoint(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(param) = folder_param {
                pairs.append_pair(param, query.folder_id.as_deref().unwrap_or(NULL_FOLDER));
            }
            pairs
                .append_pair("sort", query.sort.as_str())
                .append_pair("order", query.order.as_str())
                .append_pair("limit", &query.limit.to_string())
                .append_pair("offset", &query.offset.to_string());
        }
        Ok(url)
    }

    fn search_url(&self, query: &SearchQuery) -> Result<Url, ClientError> {
        let mut url = self.endpoint("/search")?;
        url.query_pairs_mut()
            .append_pair("q", &query.q)
            .append_pair("limit", &query.limit.to_string())
            .append_pair("offset", &query.offset.to_string())
            .append_pair("sort", query.sort.as_str())
            .append_pair("order", query.order.as_str())
            .append_pair("folder_id", query.folder_id.as_deref().unwrap_or(NULL_FOLDER));
        Ok(url)
    }

    async fn send(request: RequestBuilder, context: &str) -> Result<Response, ClientError> {
        let resp = request
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("{} failed: {}", context, e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Gateway {
                status: status.as_u16(),
                message: format!("{} failed: {}", context, sanitize_api_error(&body)),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &SecretString,
        context: &str,
    ) -> Result<T, ClientError> {
        debug!("[GATEWAY] GET {}", url.path());
        let request = self.client.get(url).header(AUTHORIZATION, Self::bearer(token)?);
        let resp = Self::send(request, context).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ClientError::Parse(format!("{} response: {}", context, e)))
    }

    fn upload_form(upload: &FileUpload, folder_id: Option<&str>) -> Result<reqwest::multipart::Form, ClientError> {
        let part = reqwest::multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime_type)
            .map_err(|e| ClientError::Validation(format!("Invalid content type {}: {}", upload.mime_type, e)))?;
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(id) = folder_id {
            form = form.text("folder_id", id.to_string());
        }
        Ok(form)
    }
}

// ─── ResourceGateway Implementation ──────────────────────────────────────

#[async_trait]
impl ResourceGateway for HttpGateway {
    fn display_name(&self) -> String {
        self.base_url.clone()
    }

    async fn list_folders(
        &self,
        token: &SecretString,
        query: &ListingQuery,
    ) -> Result<Vec<FolderEntry>, ClientError> {
        let url = self.listing_url("/folders", Some("parent_folder_id"), query)?;
        self.get_json(url, token, "List folders").await
    }

    async fn list_files(
        &self,
        token: &SecretString,
        query: &ListingQuery,
    ) -> Result<Vec<FileEntry>, ClientError> {
        let url = self.listing_url("/files", Some("folder_id"), query)?;
        self.get_json(url, token, "List files").await
    }

    async fn list_trashed_folders(
        &self,
        token: &SecretString,
        query: &ListingQuery,
    ) -> Result<Vec<FolderEntry>, ClientError> {
        let url = self.listing_url("/folders/trash", None, query)?;
        self.get_json(url, token, "List trashed folders").await
    }

    async fn list_trashed_files(
        &self,
        token: &SecretString,
        query: &ListingQuery,
    ) -> Result<Vec<FileEntry>, ClientError> {
        let url = self.listing_url("/files/trash", None, query)?;
        self.get_json(url, token, "List trashed files").await
    }

    async fn search(
        &self,
        token: &SecretString,
        query: &SearchQuery,
    ) -> Result<SearchResults, ClientError> {
        let url = self.search_url(query)?;
        self.get_json(url, token, "Search").await
    }

    async fn folder(&self, token: &SecretString, folder_id: &str) -> Result<FolderEntry, ClientError> {
        let url = self.endpoint(&format!("/folders/{}", urlencoding::encode(folder_id)))?;
        self.get_json(url, token, "Fetch folder").await
    }

    async fn breadcrumbs(
        &self,
        token: &SecretString,
        folder_id: &str,
    ) -> Result<Vec<Breadcrumb>, ClientError> {
        let url = self.endpoint(&format!("/folders/{}/breadcrumbs", urlencoding::encode(folder_id)))?;
        let crumbs: Option<Vec<Breadcrumb>> = self.get_json(url, token, "Fetch breadcrumbs").await?;
        Ok(crumbs.unwrap_or_default())
    }

    async fn create_folder(
        &self,
        token: &SecretString,
        name: &str,
        parent_folder_id: Option<&str>,
    ) -> Result<FolderEntry, ClientError> {
        gateway_log(&format!("Creating folder '{}' under {:?}", name, parent_folder_id));

        let body = serde_json::json!({
            "name": name,
            "parent_folder_id": parent_folder_id,
        });
        let request = self
            .client
            .post(self.endpoint("/folders")?)
            .header(AUTHORIZATION, Self::bearer(token)?)
            .json(&body);
        let resp = Self::send(request, "Create folder").await?;
        resp.json::<FolderEntry>()
            .await
            .map_err(|e| ClientError::Parse(format!("Create folder response: {}", e)))
    }

    async fn mutate(
        &self,
        token: &SecretString,
        kind: MutationKind,
        entry_id: &str,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&kind.path(entry_id))?;
        let request = match kind.method() {
            MutationMethod::Post => self.client.post(url),
            MutationMethod::Delete => self.client.delete(url),
        }
        .header(AUTHORIZATION, Self::bearer(token)?);

        let context = format!("{:?} {}", kind, entry_id);
        Self::send(request, &context).await?;
        gateway_log(&format!("{} {} {}", kind.resource_kind(), entry_id, kind.describe()));
        Ok(())
    }

    async fn upload_file(
        &self,
        token: &SecretString,
        upload: &FileUpload,
        folder_id: Option<&str>,
    ) -> Result<(), ClientError> {
        gateway_log(&format!(
            "Uploading {} ({} bytes) to {:?}",
            upload.file_name,
            upload.len(),
            folder_id
        ));
        let request = self
            .client
            .post(self.endpoint("/files/upload")?)
            .header(AUTHORIZATION, Self::bearer(token)?)
            .multipart(Self::upload_form(upload, folder_id)?);
        Self::send(request, &format!("Upload {}", upload.file_name)).await?;
        Ok(())
    }

    async fn upload_new_version(
        &self,
        token: &SecretString,
        file_id: &str,
        upload: &FileUpload,
    ) -> Result<(), ClientError> {
        gateway_log(&format!("Uploading new version of {} from {}", file_id, upload.file_name));
        let url = self.endpoint(&format!("/files/{}/new-version", urlencoding::encode(file_id)))?;
        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, Self::bearer(token)?)
            .multipart(Self::upload_form(upload, None)?);
        Self::send(request, "Upload new version").await?;
        Ok(())
    }

    async fn list_versions(
        &self,
        token: &SecretString,
        file_id: &str,
    ) -> Result<Vec<FileVersion>, ClientError> {
        let url = self.endpoint(&format!("/files/{}/versions", urlencoding::encode(file_id)))?;
        let versions: Option<Vec<FileVersion>> = self.get_json(url, token, "List versions").await?;
        Ok(versions.unwrap_or_default())
    }

    async fn download_version(
        &self,
        token: &SecretString,
        version_id: &str,
        local_path: &Path,
        on_progress: Option<Box<dyn Fn(u64, u64) + Send>>,
    ) -> Result<u64, ClientError> {
        use futures_util::StreamExt;
        use tokio::io::AsyncWriteExt;

        let url = self.endpoint(&format!("/files/versions/{}/download", urlencoding::encode(version_id)))?;
        let request = self
            .client
            .get(url)
            .header(AUTHORIZATION, Self::bearer(token)?)
            .header(ACCEPT, "*/*");
        let resp = Self::send(request, "Download version").await?;

        let total_size = resp.content_length().unwrap_or(0);
        let mut stream = resp.bytes_stream();
        let mut file = tokio::fs::File::create(local_path).await?;
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ClientError::Network(format!("Download interrupted: {}", e)))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if let Some(ref cb) = on_progress {
                cb(downloaded, total_size);
            }
        }
        file.flush().await?;

        gateway_log(&format!("Version {} saved to {} ({} bytes)", version_id, local_path.display(), downloaded));
        Ok(downloaded)
    }

    async fn storage_usage(&self, token: &SecretString) -> Result<StorageUsage, ClientError> {
        let url = self.endpoint("/files/storage/usage")?;
        self.get_json(url, token, "Storage usage").await
    }

    async fn create_share_link(
        &self,
        token: &SecretString,
        request: &ShareRequest,
    ) -> Result<String, ClientError> {
        gateway_log(&format!(
            "Creating {:?} share link for {} {}",
            request.role, request.resource_type, request.resource_id
        ));
        let builder = self
            .client
            .post(self.endpoint("/share/link")?)
            .header(AUTHORIZATION, Self::bearer(token)?)
            .json(request);
        let resp = Self::send(builder, "Create share link").await?;
        let link_resp: ShareLinkResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("Share link response: {}", e)))?;

        link_resp
            .link
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ClientError::Parse("Missing link in share link response".to_string()))
    }

    async fn access_share(
        &self,
        token: Option<&SecretString>,
        share_id: &str,
    ) -> Result<SharedResource, ClientError> {
        let url = self.endpoint(&format!("/share/access/{}", urlencoding::encode(share_id)))?;
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, Self::bearer(token)?);
        }
        let resp = Self::send(request, "Open shared resource").await?;
        resp.json::<SharedResource>()
            .await
            .map_err(|e| ClientError::Parse(format!("Shared resource response: {}", e)))
    }
}
