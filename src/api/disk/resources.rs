use super::{client::DiskClient, models::ResourceRecord, operations::OperationHandle};
use crate::error::{DiskError, Result};
use reqwest::Method;
use serde_json::Value;

/// What a copy/move call turned into.
#[derive(Debug)]
pub enum AsyncOutcome {
    /// The server finished synchronously; the callback has already run.
    Done,
    /// The server queued an operation that is being polled.
    Tracking(OperationHandle),
}

impl AsyncOutcome {
    /// Blocks until the operation (if any) reaches a terminal status.
    pub fn wait(self) -> Result<()> {
        match self {
            AsyncOutcome::Done => Ok(()),
            AsyncOutcome::Tracking(handle) => handle.join(),
        }
    }
}

/// A document describing the touched resource, a link to it, or an empty
/// 2xx body means the call went through.
fn check_standard(json: &Value) -> Result<()> {
    if json.is_null() || json.get("href").is_some() || json.get("path").is_some() {
        return Ok(());
    }
    Err(DiskError::from_document(json, "href"))
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

impl DiskClient {
    fn call_standard(&self, method: Method, suffix: &str, query: &[(&str, &str)]) -> Result<()> {
        let json = self.api_call(method, suffix, None, query)?;
        check_standard(&json)
    }

    /// Runs a request that may start a server-side operation and routes the
    /// result to `on_complete` exactly once.
    fn call_async(
        &self,
        suffix: &str,
        query: &[(&str, &str)],
        on_complete: impl FnOnce(Result<()>) + Send + 'static,
    ) -> Result<AsyncOutcome> {
        let href = self
            .api_call(Method::POST, suffix, None, query)
            .and_then(|json| Self::href_of(&json));
        let href = match href {
            Ok(href) => href,
            Err(err) => {
                log::warn!("[disk-resources] {suffix} rejected: {err}");
                on_complete(Err(err.clone()));
                return Err(err);
            }
        };

        if href.contains("/operations/") {
            log::debug!("[disk-resources] {suffix} queued as {href}");
            return self
                .track_operation(&href, on_complete)
                .map(AsyncOutcome::Tracking);
        }
        log::debug!("[disk-resources] {suffix} finished immediately");
        on_complete(Ok(()));
        Ok(AsyncOutcome::Done)
    }

    pub fn mkdir(&self, path: &str) -> Result<()> {
        self.call_standard(Method::PUT, "v1/disk/resources", &[("path", path)])
    }

    /// Deletes a resource. Without `permanently` it goes to the trash.
    pub fn rm(&self, path: &str, permanently: bool) -> Result<()> {
        self.call_standard(
            Method::DELETE,
            "v1/disk/resources",
            &[("path", path), ("permanently", flag(permanently))],
        )
    }

    /// Updates resource metadata, e.g. `{"custom_properties": {...}}`.
    pub fn patch(&self, path: &str, body: &Value) -> Result<()> {
        let body = body.to_string();
        let json = self.api_call(
            Method::PATCH,
            "v1/disk/resources",
            Some(&body),
            &[("path", path)],
        )?;
        check_standard(&json)
    }

    pub fn publish(&self, path: &str) -> Result<()> {
        self.call_standard(Method::PUT, "v1/disk/resources/publish", &[("path", path)])
    }

    pub fn unpublish(&self, path: &str) -> Result<()> {
        self.call_standard(Method::PUT, "v1/disk/resources/unpublish", &[("path", path)])
    }

    /// Restores `path` (a `trash:/` path) to where it was deleted from.
    pub fn trash_restore(&self, path: &str) -> Result<()> {
        self.call_standard(Method::PUT, "v1/disk/trash/resources", &[("path", path)])
    }

    pub fn trash_empty(&self) -> Result<()> {
        self.call_standard(Method::DELETE, "v1/disk/trash/resources", &[])
    }

    /// Direct download link for a file.
    pub fn file_url(&self, path: &str) -> Result<String> {
        self.resolve_download("v1/disk/resources/download", "path", path)
    }

    pub fn file_info(&self, path: &str) -> Result<ResourceRecord> {
        let json = self.api_call(Method::GET, "v1/disk/resources", None, &[("path", path)])?;
        if json.get("path").is_none() {
            return Err(DiskError::from_document_keyed(&json, "error", "path"));
        }
        Ok(ResourceRecord::from_json(&json))
    }

    pub fn cp(
        &self,
        from: &str,
        to: &str,
        overwrite: bool,
        on_complete: impl FnOnce(Result<()>) + Send + 'static,
    ) -> Result<AsyncOutcome> {
        self.call_async(
            "v1/disk/resources/copy",
            &[
                ("from", from),
                ("path", to),
                ("overwrite", flag(overwrite)),
                ("force_async", "true"),
            ],
            on_complete,
        )
    }

    pub fn mv(
        &self,
        from: &str,
        to: &str,
        overwrite: bool,
        on_complete: impl FnOnce(Result<()>) + Send + 'static,
    ) -> Result<AsyncOutcome> {
        self.call_async(
            "v1/disk/resources/move",
            &[
                ("from", from),
                ("path", to),
                ("overwrite", flag(overwrite)),
                ("force_async", "true"),
            ],
            on_complete,
        )
    }

    /// Saves someone else's public resource into the caller's disk.
    pub fn public_cp(
        &self,
        public_key: &str,
        save_path: &str,
        on_complete: impl FnOnce(Result<()>) + Send + 'static,
    ) -> Result<AsyncOutcome> {
        self.call_async(
            "v1/disk/resources/copy",
            &[
                ("public_key", public_key),
                ("save_path", save_path),
                ("force_async", "true"),
            ],
            on_complete,
        )
    }
}
