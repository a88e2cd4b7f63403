use super::{
    client::DiskClient,
    models::{Progress, TransferOutcome},
    task::TaskHandle,
};
use crate::error::{DiskError, Result};
use reqwest::{
    blocking::{Body, Client},
    Method,
};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Cursor, Read, Write},
    path::{Path, PathBuf},
};

pub type CompletionCallback = Box<dyn FnOnce(Result<TransferOutcome>) + Send>;
pub type ProgressCallback = Box<dyn FnMut(Progress) + Send>;

/// Handle to a transfer running on its own thread.
pub type TransferHandle = TaskHandle<TransferOutcome>;

/// Callbacks attached to one transfer.
///
/// Both run on the transfer thread, never on the caller's. When a completion
/// callback is set it receives the downloaded bytes, and
/// [`TransferHandle::join`] only reports the size.
#[derive(Default)]
pub struct TransferCallbacks {
    on_complete: Option<CompletionCallback>,
    on_progress: Option<ProgressCallback>,
}

impl TransferCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_complete(
        mut self,
        callback: impl FnOnce(Result<TransferOutcome>) + Send + 'static,
    ) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn on_progress(mut self, callback: impl FnMut(Progress) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Delivers the result to the completion callback, if any, and returns
    /// what the joining side should see.
    fn complete(self, result: Result<TransferOutcome>) -> Result<TransferOutcome> {
        match self.on_complete {
            Some(callback) => {
                let summary = match &result {
                    Ok(outcome) => Ok(TransferOutcome {
                        size: outcome.size,
                        data: None,
                    }),
                    Err(err) => Err(err.clone()),
                };
                callback(result);
                summary
            }
            None => result,
        }
    }
}

enum TransferKind {
    UploadFile(PathBuf),
    DownloadFile(PathBuf),
    UploadBuffer(Vec<u8>),
    DownloadBuffer,
}

impl TransferKind {
    fn label(&self) -> &'static str {
        match self {
            TransferKind::UploadFile(_) => "upload-file",
            TransferKind::DownloadFile(_) => "download-file",
            TransferKind::UploadBuffer(_) => "upload-buffer",
            TransferKind::DownloadBuffer => "download-buffer",
        }
    }
}

/// Everything one transfer thread owns.
struct TransferJob {
    kind: TransferKind,
    href: String,
    http: Client,
    callbacks: TransferCallbacks,
}

impl TransferJob {
    fn run(self) -> Result<TransferOutcome> {
        let TransferJob {
            kind,
            href,
            http,
            mut callbacks,
        } = self;
        let label = kind.label();
        log::debug!("[disk-transfer] {label} started");

        let progress = callbacks.on_progress.take();
        let result = match kind {
            TransferKind::UploadFile(path) => upload_file(&http, &href, &path, progress),
            TransferKind::UploadBuffer(data) => upload_buffer(&http, &href, data, progress),
            TransferKind::DownloadFile(path) => download_file(&http, &href, &path, progress),
            TransferKind::DownloadBuffer => download_buffer(&http, &href, progress),
        };
        match &result {
            Ok(outcome) => log::debug!("[disk-transfer] {label} finished: {} bytes", outcome.size),
            Err(err) => log::warn!("[disk-transfer] {label} failed: {err}"),
        }
        callbacks.complete(result)
    }
}

fn upload_file(
    http: &Client,
    href: &str,
    path: &Path,
    progress: Option<ProgressCallback>,
) -> Result<TransferOutcome> {
    let file = File::open(path)
        .map_err(|e| DiskError::Io(format!("failed to open {}: {e}", path.display())))?;
    let size = file
        .metadata()
        .map_err(|e| DiskError::Io(format!("failed to stat {}: {e}", path.display())))?
        .len();
    send_upload(http, href, ProgressReader::upload(file, size, progress), size)
}

fn upload_buffer(
    http: &Client,
    href: &str,
    data: Vec<u8>,
    progress: Option<ProgressCallback>,
) -> Result<TransferOutcome> {
    let size = data.len() as u64;
    send_upload(http, href, ProgressReader::upload(Cursor::new(data), size, progress), size)
}

fn send_upload<R: Read + Send + 'static>(
    http: &Client,
    href: &str,
    reader: ProgressReader<R>,
    size: u64,
) -> Result<TransferOutcome> {
    let response = http
        .request(Method::PUT, href)
        .body(Body::sized(reader, size))
        .send()
        .map_err(|e| DiskError::Transport(format!("failed to upload: {e}")))?;

    if !response.status().is_success() {
        return Err(DiskError::Transport(format!(
            "upload endpoint returned HTTP {}",
            response.status()
        )));
    }
    Ok(TransferOutcome { size, data: None })
}

fn open_download(
    http: &Client,
    href: &str,
    progress: Option<ProgressCallback>,
) -> Result<ProgressReader<reqwest::blocking::Response>> {
    let response = http
        .get(href)
        .send()
        .map_err(|e| DiskError::Transport(format!("failed to download: {e}")))?;

    if !response.status().is_success() {
        return Err(DiskError::Transport(format!(
            "download endpoint returned HTTP {}",
            response.status()
        )));
    }
    let total = response.content_length().unwrap_or(0);
    Ok(ProgressReader::download(response, total, progress))
}

fn download_file(
    http: &Client,
    href: &str,
    destination: &Path,
    progress: Option<ProgressCallback>,
) -> Result<TransferOutcome> {
    let mut reader = open_download(http, href, progress)?;

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| DiskError::Io(format!("failed to create {}: {e}", parent.display())))?;
    }
    let file = File::create(destination).map_err(|e| {
        DiskError::Io(format!(
            "failed to create destination file {}: {e}",
            destination.display()
        ))
    })?;
    let mut writer = BufWriter::new(file);

    let size = io::copy(&mut reader, &mut writer)
        .map_err(|e| DiskError::Transport(format!("failed to download into file: {e}")))?;
    writer
        .flush()
        .map_err(|e| DiskError::Io(format!("failed to flush file: {e}")))?;

    Ok(TransferOutcome { size, data: None })
}

fn download_buffer(
    http: &Client,
    href: &str,
    progress: Option<ProgressCallback>,
) -> Result<TransferOutcome> {
    let mut reader = open_download(http, href, progress)?;
    let mut data = Vec::new();
    data.try_reserve(reader.total as usize)
        .map_err(|e| DiskError::Io(format!("cannot buffer {} bytes: {e}", reader.total)))?;
    reader
        .read_to_end(&mut data)
        .map_err(|e| DiskError::Transport(format!("failed to read download: {e}")))?;
    Ok(TransferOutcome {
        size: data.len() as u64,
        data: Some(data),
    })
}

/// Reader that reports every chunk to a progress callback.
struct ProgressReader<R: Read> {
    inner: R,
    done: u64,
    total: u64,
    upload: bool,
    progress: Option<ProgressCallback>,
}

impl<R: Read> ProgressReader<R> {
    fn upload(inner: R, total: u64, progress: Option<ProgressCallback>) -> Self {
        Self {
            inner,
            done: 0,
            total,
            upload: true,
            progress,
        }
    }

    fn download(inner: R, total: u64, progress: Option<ProgressCallback>) -> Self {
        Self {
            upload: false,
            ..Self::upload(inner, total, progress)
        }
    }

    fn snapshot(&self) -> Progress {
        if self.upload {
            Progress {
                upload_total: self.total,
                uploaded: self.done,
                ..Progress::default()
            }
        } else {
            Progress {
                download_total: self.total,
                downloaded: self.done,
                ..Progress::default()
            }
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read_bytes = self.inner.read(buf)?;
        if read_bytes > 0 {
            self.done = self.done.saturating_add(read_bytes as u64);
            let snapshot = self.snapshot();
            if let Some(cb) = self.progress.as_mut() {
                cb(snapshot);
            }
        }
        Ok(read_bytes)
    }
}

impl DiskClient {
    /// Uploads a local file to `remote` (`disk:/…` or `app:/…`).
    ///
    /// The upload URL is resolved on the calling thread; if that fails the
    /// completion callback runs right away with the error, which is also
    /// returned, and nothing is spawned.
    pub fn upload_file(
        &self,
        local: impl AsRef<Path>,
        remote: &str,
        overwrite: bool,
        callbacks: TransferCallbacks,
    ) -> Result<TransferHandle> {
        let href = self.resolve_upload(remote, overwrite);
        self.start_transfer(
            href,
            TransferKind::UploadFile(local.as_ref().to_path_buf()),
            callbacks,
        )
    }

    /// Uploads an in-memory buffer to `remote`.
    pub fn upload_buffer(
        &self,
        data: Vec<u8>,
        remote: &str,
        overwrite: bool,
        callbacks: TransferCallbacks,
    ) -> Result<TransferHandle> {
        let href = self.resolve_upload(remote, overwrite);
        self.start_transfer(href, TransferKind::UploadBuffer(data), callbacks)
    }

    /// Downloads `remote` into a local file, creating parent directories.
    pub fn download_file(
        &self,
        remote: &str,
        local: impl AsRef<Path>,
        callbacks: TransferCallbacks,
    ) -> Result<TransferHandle> {
        let href = self.resolve_download("v1/disk/resources/download", "path", remote);
        self.start_transfer(
            href,
            TransferKind::DownloadFile(local.as_ref().to_path_buf()),
            callbacks,
        )
    }

    /// Downloads `remote` into memory; the bytes arrive in
    /// [`TransferOutcome::data`].
    pub fn download_buffer(
        &self,
        remote: &str,
        callbacks: TransferCallbacks,
    ) -> Result<TransferHandle> {
        let href = self.resolve_download("v1/disk/resources/download", "path", remote);
        self.start_transfer(href, TransferKind::DownloadBuffer, callbacks)
    }

    /// Downloads a public resource (key or public URL) into a local file.
    pub fn download_public_file(
        &self,
        public_key: &str,
        local: impl AsRef<Path>,
        callbacks: TransferCallbacks,
    ) -> Result<TransferHandle> {
        let href =
            self.resolve_download("v1/disk/public/resources/download", "public_key", public_key);
        self.start_transfer(
            href,
            TransferKind::DownloadFile(local.as_ref().to_path_buf()),
            callbacks,
        )
    }

    /// Downloads a public resource into memory.
    pub fn download_public_buffer(
        &self,
        public_key: &str,
        callbacks: TransferCallbacks,
    ) -> Result<TransferHandle> {
        let href =
            self.resolve_download("v1/disk/public/resources/download", "public_key", public_key);
        self.start_transfer(href, TransferKind::DownloadBuffer, callbacks)
    }

    fn resolve_upload(&self, remote: &str, overwrite: bool) -> Result<String> {
        let overwrite = if overwrite { "true" } else { "false" };
        let json = self.api_call(
            Method::GET,
            "v1/disk/resources/upload",
            None,
            &[("path", remote), ("overwrite", overwrite)],
        )?;
        Self::href_of(&json)
    }

    pub(super) fn resolve_download(&self, suffix: &str, key: &str, value: &str) -> Result<String> {
        let json = self.api_call(Method::GET, suffix, None, &[(key, value)])?;
        Self::href_of(&json)
    }

    fn start_transfer(
        &self,
        href: Result<String>,
        kind: TransferKind,
        callbacks: TransferCallbacks,
    ) -> Result<TransferHandle> {
        let href = match href {
            Ok(href) => href,
            Err(err) => {
                log::warn!("[disk-transfer] {} not started: {err}", kind.label());
                let _ = callbacks.complete(Err(err.clone()));
                return Err(err);
            }
        };
        let job = TransferJob {
            kind,
            href,
            http: self.transfer_http().clone(),
            callbacks,
        };
        TaskHandle::spawn("ydisk-transfer", job, TransferJob::run, |job, err| {
            let _ = job.callbacks.complete(Err(err));
        })
    }
}
