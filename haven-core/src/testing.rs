//! Test doubles shared by the reconciler and queue tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::models::SyncItem;
use crate::notifier::{Notification, Notifier};
use crate::submitter::{SubmitError, Submitter};

type SubmitHook = Box<dyn Fn(usize) + Send + Sync>;

/// Submitter whose outcome per item is decided by the test.
#[derive(Default)]
pub struct ScriptedSubmitter {
    failing: Mutex<HashSet<String>>,
    fail_all: Mutex<Option<SubmitError>>,
    calls: Mutex<Vec<String>>,
    hook: Mutex<Option<SubmitHook>>,
}

impl ScriptedSubmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_item(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_all_with(&self, error: SubmitError) {
        *self.fail_all.lock().unwrap() = Some(error);
    }

    pub fn succeed_all(&self) {
        self.failing.lock().unwrap().clear();
        *self.fail_all.lock().unwrap() = None;
    }

    /// Runs `hook` with the zero-based call index before each submission.
    pub fn on_submit(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Submitter for ScriptedSubmitter {
    async fn submit(&self, item: &SyncItem) -> Result<(), SubmitError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(item.id.clone());
            calls.len() - 1
        };
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(index);
        }

        if let Some(error) = self.fail_all.lock().unwrap().clone() {
            return Err(error);
        }
        if self.failing.lock().unwrap().contains(&item.id) {
            return Err(SubmitError::Transport("connection reset".to_string()));
        }
        Ok(())
    }
}

/// Notifier that remembers everything it was given.
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}
