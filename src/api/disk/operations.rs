use super::{client::DiskClient, models::OperationStatus, task::TaskHandle};
use crate::error::{DiskError, Result};
use reqwest::Method;
use serde_json::Value;
use std::{thread, time::Duration};

pub type OperationCallback = Box<dyn FnOnce(Result<()>) + Send>;

/// Handle to a thread following a server-side operation.
pub type OperationHandle = TaskHandle<()>;

/// How often and how long an operation is polled.
#[derive(Clone, Debug)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_checks: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            max_checks: 120,
        }
    }
}

/// Extracts `<id>` from `https://cloud-api.yandex.net/v1/disk/operations/<id>`.
pub fn operation_id_from_href(href: &str) -> Option<String> {
    let without_query = href.split(['?', '#']).next().unwrap_or(href);
    let (_, tail) = without_query.split_once("/operations/")?;
    let id = tail.trim_matches('/');
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id.to_string())
}

/// Everything the polling thread owns.
struct OperationJob {
    id: String,
    client: DiskClient,
    policy: PollPolicy,
    on_complete: OperationCallback,
}

impl OperationJob {
    fn run(self) -> Result<()> {
        let result = self.poll();
        match &result {
            Ok(()) => log::debug!("[disk-operation] {} succeeded", self.id),
            Err(err) => log::warn!("[disk-operation] {} failed: {err}", self.id),
        }
        (self.on_complete)(result.clone());
        result
    }

    fn poll(&self) -> Result<()> {
        let mut delay = self.policy.initial_delay;
        for check in 0..self.policy.max_checks {
            match self.client.operation_status(&self.id)? {
                OperationStatus::Success => return Ok(()),
                OperationStatus::Failed => {
                    return Err(DiskError::Api(format!("operation {} failed", self.id)))
                }
                OperationStatus::InProgress if check + 1 == self.policy.max_checks => break,
                OperationStatus::InProgress => {
                    log::trace!("[disk-operation] {} in progress (check {check})", self.id);
                    thread::sleep(delay);
                    delay = (delay * 2).min(self.policy.max_delay);
                }
            }
        }
        Err(DiskError::Protocol(format!(
            "operation {} still in progress after {} checks",
            self.id, self.policy.max_checks
        )))
    }
}

impl DiskClient {
    /// One status check of a server-side operation.
    pub fn operation_status(&self, id: &str) -> Result<OperationStatus> {
        let suffix = format!("v1/disk/operations/{id}");
        let json = self.api_call(Method::GET, &suffix, None, &[])?;
        json.get("status")
            .and_then(Value::as_str)
            .map(OperationStatus::from_api_str)
            .ok_or_else(|| DiskError::from_document(&json, "status"))
    }

    /// Follows the operation behind `href` on a new thread until it reaches a
    /// terminal status, then calls `on_complete`.
    pub fn track_operation(
        &self,
        href: &str,
        on_complete: impl FnOnce(Result<()>) + Send + 'static,
    ) -> Result<OperationHandle> {
        self.track_operation_with(href, PollPolicy::default(), on_complete)
    }

    pub fn track_operation_with(
        &self,
        href: &str,
        policy: PollPolicy,
        on_complete: impl FnOnce(Result<()>) + Send + 'static,
    ) -> Result<OperationHandle> {
        let Some(id) = operation_id_from_href(href) else {
            let err = DiskError::Protocol(format!("not an operation link: {href}"));
            on_complete(Err(err.clone()));
            return Err(err);
        };
        let job = OperationJob {
            id,
            client: self.clone(),
            policy,
            on_complete: Box::new(on_complete),
        };
        TaskHandle::spawn("ydisk-operation", job, OperationJob::run, |job, err| {
            (job.on_complete)(Err(err))
        })
    }
}
