//! In-memory router used by the device collector tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::Value;

use super::client::{DeviceClient, DeviceError, DeviceInfo, Host, Session};

#[derive(Default)]
pub(crate) struct FakeClient {
    info: Mutex<DeviceInfo>,
    hosts: Mutex<Vec<Host>>,
    values: Mutex<HashMap<String, Value>>,
    fail: Mutex<Option<DeviceError>>,
    logins: AtomicU32,
}

impl FakeClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_hosts(&self, hosts: Vec<Host>) {
        *self.hosts.lock().unwrap() = hosts;
    }

    pub(crate) fn set_value(&self, path: &str, value: Value) {
        self.values.lock().unwrap().insert(path.to_owned(), value);
    }

    /// Make every data call fail with `err` until cleared.
    pub(crate) fn fail_with(&self, err: Option<DeviceError>) {
        *self.fail.lock().unwrap() = err;
    }

    pub(crate) fn login_count(&self) -> u32 {
        self.logins.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), DeviceError> {
        match self.fail.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl DeviceClient for FakeClient {
    async fn login(&self) -> Result<Session, DeviceError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(Session::new(format!("session-{n}")))
    }

    async fn device_info(&self, _session: &Session) -> Result<DeviceInfo, DeviceError> {
        self.check()?;
        Ok(self.info.lock().unwrap().clone())
    }

    async fn hosts(&self, _session: &Session) -> Result<Vec<Host>, DeviceError> {
        self.check()?;
        Ok(self.hosts.lock().unwrap().clone())
    }

    async fn value_by_path(&self, _session: &Session, path: &str) -> Result<Value, DeviceError> {
        self.check()?;
        self.values
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| DeviceError::UnsupportedPath(path.to_owned()))
    }
}
