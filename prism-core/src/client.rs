//! HTTP implementation of [`PrismApi`] on top of `reqwest`.
//!
//! - Construct with [`PrismClient::connect`], which performs the token exchange.
//! - Every request carries `Authorization: Bearer <token>`. The token is
//!   re-acquired only once its recorded lifetime has passed; a 401 from the
//!   server is returned to the caller as an API error.
//! - Calls are awaited one at a time; nothing here runs requests concurrently.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::auth::{acquire_token, BearerToken};
use crate::config::Settings;
use crate::contract::PrismApi;
use crate::error::{PrismError, Result};
use crate::model::{
    Bucket, BucketList, BucketQuery, Detail, Listing, NewBucket, NewTable, Table,
    TableDefinition, TableList, TableQuery, UploadFile,
};

/// Largest page the list endpoints hand out.
pub const PAGE_SIZE: usize = 100;

pub struct PrismClient {
    http: reqwest::Client,
    settings: Settings,
    endpoint: String,
    token: Mutex<Option<BearerToken>>,
}

impl std::fmt::Debug for PrismClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrismClient")
            .field("endpoint", &self.endpoint)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PrismClient {
    /// Build a client without authenticating yet; the first call fetches a token.
    pub fn new(settings: Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("prism-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PrismError::config(format!("failed to build HTTP client: {e}")))?;
        let endpoint = settings.prism_endpoint();
        Ok(Self {
            http,
            settings,
            endpoint,
            token: Mutex::new(None),
        })
    }

    /// Build a client and exchange the refresh token immediately.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let client = Self::new(settings)?;
        client.reauthenticate().await?;
        info!(endpoint = %client.endpoint, "Connected to Prism");
        Ok(client)
    }

    /// Discard the current token and acquire a new one.
    pub async fn reauthenticate(&self) -> Result<()> {
        self.refresh_token().await.map(|_| ())
    }

    async fn refresh_token(&self) -> Result<String> {
        let token = acquire_token(&self.http, &self.settings).await?;
        let secret = token.secret().to_string();
        *self.lock_token() = Some(token);
        Ok(secret)
    }

    fn lock_token(&self) -> MutexGuard<'_, Option<BearerToken>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn bearer(&self) -> Result<String> {
        let cached = self
            .lock_token()
            .as_ref()
            .filter(|t| !t.is_expired())
            .map(|t| t.secret().to_string());
        match cached {
            Some(secret) => Ok(secret),
            None => {
                debug!("Bearer token missing or expired, acquiring a new one");
                self.refresh_token().await
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Authorize, send and check the status of one request.
    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let token = self.bearer().await?;
        let request = builder.bearer_auth(token).build()?;
        let method = request.method().clone();
        let url = request.url().clone();

        let started = Instant::now();
        let response = self.http.execute(request).await.map_err(|e| {
            error!(error = ?e, %method, %url, "Request could not be sent");
            PrismError::from(e)
        })?;
        let status = response.status();
        debug!(
            %method,
            %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Prism call finished"
        );

        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(%method, %url, status = status.as_u16(), body = %body, "Prism call failed");
        Err(PrismError::Api {
            status: Some(status.as_u16()),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let response = self.send(self.http.get(self.url(path)).query(params)).await?;
        Ok(response.json::<T>().await?)
    }

    /// Walk list pages until a short or empty page, keeping entries accepted by `keep`.
    ///
    /// A page size of zero is rejected before any request is sent.
    async fn collect_pages<T, F>(
        &self,
        path: &str,
        params: Vec<(&str, String)>,
        limit: Option<usize>,
        offset: Option<usize>,
        fetch_all: bool,
        keep: F,
    ) -> Result<Listing<T>>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let limit = limit.unwrap_or(PAGE_SIZE);
        if limit == 0 {
            return Err(PrismError::config("limit must be at least 1"));
        }
        let mut offset = offset.unwrap_or(0);
        let mut data = Vec::new();
        loop {
            let mut page_params = params.clone();
            page_params.push(("limit", limit.to_string()));
            page_params.push(("offset", offset.to_string()));
            let page: Listing<T> = self.get_json(path, &page_params).await?;
            let count = page.data.len();
            data.extend(page.data.into_iter().filter(|item| keep(item)));
            if !fetch_all || count == 0 || count < limit {
                break;
            }
            offset += limit;
        }
        Ok(Listing::from_items(data))
    }
}

/// Parse a JSON body, treating an empty body as `null`.
async fn json_or_null(response: Response) -> Result<Value> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl PrismApi for PrismClient {
    async fn list_tables(&self, query: &TableQuery) -> Result<TableList> {
        let detail = query.detail.as_str().to_string();
        if let Some(id) = &query.id {
            let table: Table = self
                .get_json(&format!("/tables/{id}"), &[("format", detail)])
                .await?;
            return Ok(Listing::from_items(vec![table]));
        }

        let params = vec![("type", detail)];
        match (&query.name, query.search) {
            (Some(name), false) => {
                let mut exact = params;
                exact.push(("name", name.replace(' ', "_")));
                exact.push(("limit", "1".to_string()));
                exact.push(("offset", "0".to_string()));
                let page: TableList = self.get_json("/tables", &exact).await?;
                Ok(Listing::from_items(page.data))
            }
            (name, search) => {
                let fetch_all = search || query.limit.is_none();
                let listing = self
                    .collect_pages("/tables", params, query.limit, query.offset, fetch_all, |t: &Table| {
                        name.as_deref().map_or(true, |n| {
                            contains_ci(&t.name, n)
                                || t.display_name.as_deref().is_some_and(|d| contains_ci(d, n))
                        })
                    })
                    .await?;
                info!(total = listing.total, "Listed tables");
                Ok(listing)
            }
        }
    }

    async fn describe_table(&self, id: &str) -> Result<Table> {
        self.get_json(&format!("/tables/{id}"), &[("format", Detail::Full.as_str().to_string())])
            .await
    }

    async fn create_table(&self, table: &NewTable) -> Result<Table> {
        info!(table = %table.name, fields = table.fields.len(), "Creating table");
        let response = self.send(self.http.post(self.url("/tables")).json(table)).await?;
        let created: Table = response.json().await?;
        info!(table_id = %created.id, "Created table");
        Ok(created)
    }

    async fn update_table(&self, id: &str, definition: &TableDefinition) -> Result<Table> {
        info!(table_id = id, fields = definition.fields.len(), "Updating table");
        let response = self
            .send(self.http.put(self.url(&format!("/tables/{id}"))).json(definition))
            .await?;
        Ok(response.json().await?)
    }

    async fn list_buckets(&self, query: &BucketQuery) -> Result<BucketList> {
        let detail = match query.detail {
            Detail::Full => Detail::Full,
            _ => Detail::Summary,
        }
        .as_str()
        .to_string();
        if let Some(id) = &query.id {
            let bucket: Bucket = self
                .get_json(&format!("/buckets/{id}"), &[("format", detail)])
                .await?;
            return Ok(Listing::from_items(vec![bucket]));
        }

        let params = vec![("type", detail)];
        if let (Some(name), false) = (&query.name, query.search) {
            let mut exact = params;
            exact.push(("name", name.clone()));
            exact.push(("limit", "1".to_string()));
            exact.push(("offset", "0".to_string()));
            let page: BucketList = self.get_json("/buckets", &exact).await?;
            return Ok(Listing::from_items(page.data));
        }

        let search = query.search;
        let fetch_all = query.name.is_some() || query.table_name.is_some() || query.limit.is_none();
        let listing = self
            .collect_pages("/buckets", params, query.limit, query.offset, fetch_all, |b: &Bucket| {
                if let Some(name) = &query.name {
                    return contains_ci(&b.name, name);
                }
                match (&query.table_name, b.target_dataset.as_ref().and_then(|t| t.descriptor.as_deref())) {
                    (Some(wanted), Some(target)) => {
                        target == wanted || (search && contains_ci(target, wanted))
                    }
                    (Some(_), None) => false,
                    (None, _) => true,
                }
            })
            .await?;
        info!(total = listing.total, "Listed buckets");
        Ok(listing)
    }

    async fn describe_bucket(&self, id: &str) -> Result<Bucket> {
        self.get_json(&format!("/buckets/{id}"), &[("format", Detail::Full.as_str().to_string())])
            .await
    }

    async fn create_bucket(&self, bucket: &NewBucket) -> Result<Bucket> {
        info!(
            bucket = %bucket.name,
            table_id = %bucket.target_dataset.id,
            operation = %bucket.operation.id,
            "Creating bucket"
        );
        let response = self.send(self.http.post(self.url("/buckets")).json(bucket)).await?;
        let created: Bucket = response.json().await?;
        info!(bucket_id = %created.id, "Created bucket");
        Ok(created)
    }

    async fn upload_file(&self, bucket_id: &str, file: &UploadFile) -> Result<Value> {
        info!(bucket_id, file = %file.file_name, bytes = file.content.len(), "Uploading file");
        let part = Part::bytes(file.content.clone())
            .file_name(file.file_name.clone())
            .mime_str("application/gzip")?;
        let form = Form::new().part("file", part);
        let response = self
            .send(
                self.http
                    .post(self.url(&format!("/buckets/{bucket_id}/files")))
                    .multipart(form),
            )
            .await?;
        json_or_null(response).await
    }

    async fn complete_bucket(&self, bucket_id: &str) -> Result<Value> {
        info!(bucket_id, "Completing bucket");
        let response = self
            .send(self.http.post(self.url(&format!("/buckets/{bucket_id}/complete"))))
            .await?;
        json_or_null(response).await
    }

    async fn error_file(&self, bucket_id: &str) -> Result<String> {
        let response = self
            .send(self.http.get(self.url(&format!("/buckets/{bucket_id}/errorFile"))))
            .await?;
        Ok(response.text().await?)
    }
}
