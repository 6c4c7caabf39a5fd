//! Per-collector cache of the router login session.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::client::{DeviceClient, DeviceError, Session};

/// Login session owned by a single collector.
///
/// The session is opened lazily, reused across polls, and dropped as soon as
/// the device reports an authentication failure so the next poll logs in
/// again. No retry happens within the failing poll.
pub(crate) struct SessionCache {
    client: Arc<dyn DeviceClient>,
    session: Mutex<Option<Session>>,
}

impl SessionCache {
    pub(crate) fn new(client: Arc<dyn DeviceClient>) -> Self {
        Self {
            client,
            session: Mutex::new(None),
        }
    }

    /// Run `op` with a valid session, logging in first if needed.
    pub(crate) async fn run<T, F, Fut>(&self, op: F) -> Result<T, DeviceError>
    where
        F: FnOnce(Arc<dyn DeviceClient>, Session) -> Fut,
        Fut: Future<Output = Result<T, DeviceError>>,
    {
        let session = {
            let mut cached = self.session.lock().await;
            match cached.as_ref() {
                Some(session) => session.clone(),
                None => {
                    let session = self.client.login().await?;
                    tracing::debug!("Device login succeeded");
                    *cached = Some(session.clone());
                    session
                }
            }
        };

        let result = op(Arc::clone(&self.client), session).await;
        if let Err(DeviceError::Auth(reason)) = &result {
            tracing::debug!(%reason, "Discarding device session");
            *self.session.lock().await = None;
        }
        result
    }

    #[cfg(test)]
    pub(crate) async fn is_open(&self) -> bool {
        self.session.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::device::{DeviceInfo, Host};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingClient {
        logins: AtomicU32,
    }

    #[async_trait::async_trait]
    impl DeviceClient for CountingClient {
        async fn login(&self) -> Result<Session, DeviceError> {
            let n = self.logins.fetch_add(1, Ordering::SeqCst);
            Ok(Session::new(format!("token-{n}")))
        }

        async fn device_info(&self, session: &Session) -> Result<DeviceInfo, DeviceError> {
            if session.token == "token-0" {
                Err(DeviceError::Auth("expired".into()))
            } else {
                Ok(DeviceInfo::default())
            }
        }

        async fn hosts(&self, _session: &Session) -> Result<Vec<Host>, DeviceError> {
            Ok(Vec::new())
        }

        async fn value_by_path(
            &self,
            _session: &Session,
            path: &str,
        ) -> Result<serde_json::Value, DeviceError> {
            Err(DeviceError::UnsupportedPath(path.to_owned()))
        }
    }

    #[tokio::test]
    async fn test_session_reused_and_discarded_on_auth_failure() {
        let client = Arc::new(CountingClient {
            logins: AtomicU32::new(0),
        });
        let cache = SessionCache::new(client.clone());

        // token-0 is rejected: session dropped, no retry within the call.
        let first = cache
            .run(|c, s| async move { c.device_info(&s).await })
            .await;
        assert!(matches!(first, Err(DeviceError::Auth(_))));
        assert!(!cache.is_open().await);
        assert_eq!(client.logins.load(Ordering::SeqCst), 1);

        // Next call logs in again and keeps the session.
        cache
            .run(|c, s| async move { c.device_info(&s).await })
            .await
            .unwrap();
        assert!(cache.is_open().await);

        cache
            .run(|c, s| async move { c.hosts(&s).await })
            .await
            .unwrap();
        assert_eq!(client.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_auth_error_keeps_session() {
        let client = Arc::new(CountingClient {
            logins: AtomicU32::new(1),
        });
        let cache = SessionCache::new(client);
        let result = cache
            .run(|c, s| async move { c.value_by_path(&s, "Device/NAT/PortMappings").await })
            .await;
        assert!(matches!(result, Err(DeviceError::UnsupportedPath(_))));
        assert!(cache.is_open().await);
    }
}
