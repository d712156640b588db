//! Single-flight session renewal.
//!
//! When a request fails for authentication reasons, many of its siblings
//! usually fail in the same tick. The coordinator makes sure they all share
//! one renewal call: the check-and-install of the in-flight handle happens
//! under a synchronous lock with no await point in between, so there is no
//! window in which two callers can each start a renewal.
//!
//! Renewal failures never surface to callers. They are logged, the session is
//! cleared, the expired hook fires (once), and the operation resolves to "no
//! token" - the original request's authentication failure is what propagates.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::auth::session::{Session, SessionStore};

use super::envelope::{Envelope, SUCCESS_CODE};
use super::transport::{Transport, TransportRequest};

/// Invoked when the session has been cleared because renewal was impossible
/// or rejected. Navigation layers typically redirect to the login page; the
/// hook should be idempotent, though the coordinator already deduplicates per
/// renewal operation.
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// No-op hook for consumers that wire navigation up elsewhere.
pub fn noop_expired_hook() -> SessionExpiredHook {
    Arc::new(|| {})
}

type RenewalHandle = Shared<BoxFuture<'static, Option<String>>>;

/// Owner of the single-flight renewal protocol.
pub struct RefreshCoordinator {
    session: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    refresh_url: String,
    on_expired: SessionExpiredHook,
    in_flight: Mutex<Option<RenewalHandle>>,
}

impl RefreshCoordinator {
    pub fn new(
        session: Arc<SessionStore>,
        transport: Arc<dyn Transport>,
        refresh_url: String,
        on_expired: SessionExpiredHook,
    ) -> Self {
        Self {
            session,
            transport,
            refresh_url,
            on_expired,
            in_flight: Mutex::new(None),
        }
    }

    /// Obtain (or join) the renewal operation and wait for its outcome.
    ///
    /// Returns the fresh bearer token, or `None` when the session could not
    /// be renewed - in which case the session has already been cleared and
    /// the expired hook has fired.
    pub async fn recover(&self) -> Option<String> {
        let handle = self.obtain_handle();
        let outcome = handle.clone().await;

        // First caller past the finish line retires the handle so the next
        // failure starts a fresh operation. Late joiners of an already
        // settled handle still see its outcome.
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&handle)) {
            *slot = None;
        }
        drop(slot);

        outcome
    }

    /// Check-and-install in one synchronous step. No suspension may happen
    /// between reading the slot and filling it.
    fn obtain_handle(&self) -> RenewalHandle {
        let mut slot = self.slot();
        if let Some(existing) = slot.as_ref() {
            debug!("Joining in-flight session renewal");
            return existing.clone();
        }

        let handle = renew(
            Arc::clone(&self.session),
            Arc::clone(&self.transport),
            self.refresh_url.clone(),
            Arc::clone(&self.on_expired),
        )
        .boxed()
        .shared();
        *slot = Some(handle.clone());
        handle
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<RenewalHandle>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The renewal operation itself. Runs at most once per installed handle.
async fn renew(
    session: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    refresh_url: String,
    on_expired: SessionExpiredHook,
) -> Option<String> {
    let Some(refresh_token) = session.refresh_token() else {
        debug!("No refresh token stored, session cannot be renewed");
        expire(&session, &on_expired);
        return None;
    };

    let request = TransportRequest::new(Method::POST, refresh_url)
        .with_body(json!({ "refreshToken": refresh_token }));

    let token = match transport.send(request).await {
        Ok(response) => match Envelope::from_body(&response.body) {
            Some(envelope) if envelope.code == SUCCESS_CODE => {
                apply_renewal(&session, refresh_token, envelope.data)
            }
            Some(envelope) => {
                warn!(code = envelope.code, info = envelope.info.unwrap_or(""), "Session renewal rejected");
                None
            }
            None => {
                warn!(status = %response.status, "Renewal response was not an envelope");
                None
            }
        },
        Err(err) => {
            warn!(error = %err, "Session renewal call failed");
            None
        }
    };

    if token.is_none() {
        expire(&session, &on_expired);
    }
    token
}

/// Store the renewed credentials. The profile is preserved; a missing
/// rotated refresh token keeps the old one.
fn apply_renewal(
    session: &SessionStore,
    old_refresh_token: String,
    data: Option<&serde_json::Value>,
) -> Option<String> {
    let data = data?;
    let token = data.get("token").and_then(|v| v.as_str())?.to_string();
    let next_refresh = data
        .get("refreshToken")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or(old_refresh_token);

    session.set(Session {
        token: Some(token.clone()),
        refresh_token: Some(next_refresh),
        user: session.snapshot().user,
    });
    info!("Session renewed");
    Some(token)
}

fn expire(session: &SessionStore, on_expired: &SessionExpiredHook) {
    if session.clear_if_present() {
        info!("Session expired, signalling navigation to login");
        on_expired();
    }
}
