use crate::error::{DiskError, Result};
use std::io;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Handle to work running on its own thread.
///
/// Dropping the handle (or calling [`TaskHandle::detach`]) lets the work run
/// to completion unobserved; callbacks still fire. [`TaskHandle::join`] blocks
/// until it is done.
#[derive(Debug)]
pub struct TaskHandle<T> {
    inner: JoinHandle<Result<T>>,
}

type Slot<P> = Arc<Mutex<Option<P>>>;

fn take<P>(slot: &Slot<P>) -> Option<P> {
    slot.lock().ok().and_then(|mut payload| payload.take())
}

impl<T: Send + 'static> TaskHandle<T> {
    /// Runs `work(payload)` on a new thread. If the thread cannot be started,
    /// `payload` is handed to `rescue` on the calling thread instead, so
    /// callbacks it carries still see the error.
    pub(crate) fn spawn<P, F, R>(name: &str, payload: P, work: F, rescue: R) -> Result<Self>
    where
        P: Send + 'static,
        F: FnOnce(P) -> Result<T> + Send + 'static,
        R: FnOnce(P, DiskError),
    {
        let slot: Slot<P> = Arc::new(Mutex::new(Some(payload)));
        let shared = slot.clone();
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || match take(&shared) {
                Some(payload) => work(payload),
                None => Err(DiskError::Io("task payload already taken".to_string())),
            });
        Self::settle(name, spawned, &slot, rescue)
    }

    fn settle<P, R>(
        name: &str,
        spawned: io::Result<JoinHandle<Result<T>>>,
        slot: &Slot<P>,
        rescue: R,
    ) -> Result<Self>
    where
        R: FnOnce(P, DiskError),
    {
        match spawned {
            Ok(inner) => Ok(Self { inner }),
            Err(e) => {
                let err = DiskError::Io(format!("failed to spawn {name} thread: {e}"));
                if let Some(payload) = take(slot) {
                    rescue(payload, err.clone());
                }
                Err(err)
            }
        }
    }

    /// Waits for the thread and returns what it reported to its callback.
    pub fn join(self) -> Result<T> {
        self.inner
            .join()
            .map_err(|_| DiskError::Io("background thread panicked".to_string()))?
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    pub fn detach(self) {}
}
