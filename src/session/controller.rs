use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

use super::poll::PollHandle;
use crate::api::{ApiClient, LOGIN};
use crate::error::Error;
use crate::gateway::Gateway;
use crate::order::{Order, OrderDraft};
use crate::route::{Route, derive_route};
use crate::store::{KeyValueStore, StoreError, TOKEN_KEY, USER_KEY};
use crate::types::{ActiveSession, LoadingState, Session, User};
use crate::validation::is_valid_email;

/// Owns the client session and is the only thing allowed to change it.
///
/// Construct one per running client, wrap it in an [`Arc`] and hand clones to
/// whatever needs to read the session or trigger login/logout. Readers get
/// snapshots via [`session`](Self::session) or change notifications via
/// [`subscribe`](Self::subscribe); there are no setters.
pub struct SessionController<G, S> {
    api: ApiClient<G>,
    store: S,
    state: watch::Sender<Session>,
    login_in_flight: AtomicBool,
    poller: Mutex<Option<CancellationToken>>,
}

impl<G: Gateway, S: KeyValueStore> SessionController<G, S> {
    /// Create a controller with an empty, still-initializing session.
    /// Call [`init`](Self::init) before reading it.
    #[must_use]
    pub fn new(gateway: G, store: S) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            api: ApiClient::new(gateway),
            store,
            state,
            login_in_flight: AtomicBool::new(false),
            poller: Mutex::new(None),
        }
    }

    /// Restore any stored session. Alias of [`restore`](Self::restore).
    pub async fn init(&self) {
        self.restore().await;
    }

    /// Stop background work. The session itself is left as is.
    pub fn dispose(&self) {
        self.stop_polling();
    }

    /// Typed access to the non-session operations (registration, password
    /// reset, admin tier assignment).
    #[must_use]
    pub fn api(&self) -> &ApiClient<G> {
        &self.api
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Screen set the presentation layer should show right now.
    #[must_use]
    pub fn route(&self) -> Route {
        derive_route(&self.state.borrow())
    }

    /// Receiver notified after every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Whether a login call is outstanding. Disable the submit control while true.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.login_in_flight.load(Ordering::Acquire)
    }

    // ── Restore ────────────────────────────────────────────────────────

    /// Load the session persisted by a previous run.
    ///
    /// Never fails: unreadable or inconsistent storage means "no prior
    /// session". A session already in memory (a login that finished first)
    /// is kept. Always leaves the controller [`LoadingState::Idle`].
    pub async fn restore(&self) {
        let active = match self.load_stored().await {
            Ok(active) => active,
            Err(e) => {
                tracing::warn!(error = %e, "Stored session unreadable, starting logged out");
                None
            }
        };

        if let Some(active) = &active {
            tracing::info!(user_id = %active.user.id, "Session restored");
        }

        // A login that finished while the store was being read wins.
        self.state.send_if_modified(|s| {
            let mut modified = s.loading_state != LoadingState::Idle;
            if s.active.is_none() && active.is_some() {
                s.active = active;
                modified = true;
            }
            s.loading_state = LoadingState::Idle;
            modified
        });
    }

    async fn load_stored(&self) -> Result<Option<ActiveSession>, Error> {
        let user = self.store.get(USER_KEY).await.map_err(Error::storage)?;
        let token = self.store.get(TOKEN_KEY).await.map_err(Error::storage)?;

        let (Some(user), Some(token)) = (user, token) else {
            return Ok(None);
        };
        if token.is_empty() {
            return Ok(None);
        }
        let user: User = serde_json::from_str(&user).map_err(Error::storage)?;
        Ok(Some(ActiveSession { token, user }))
    }

    // ── Login ──────────────────────────────────────────────────────────

    /// Exchange credentials for a session.
    ///
    /// The session is written to the store before it becomes visible, so a
    /// successful return means it will survive a restart.
    ///
    /// # Errors
    ///
    /// - [`Error::Authentication`]: the server rejected the credentials, either
    ///   in the login payload or through the response's `errors` list.
    /// - [`Error::CredentialExpired`]: valid credentials, expired password.
    /// - [`Error::Transport`]: no usable response from the gateway.
    /// - [`Error::Storage`]: the session could not be persisted; nothing changed.
    /// - [`Error::Busy`]: another login is still running.
    ///
    /// On any error the session is exactly as before the call.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<User, Error> {
        if self.login_in_flight.swap(true, Ordering::AcqRel) {
            return Err(Error::Busy);
        }
        let _busy = BusyGuard(&self.login_in_flight);

        let outcome = self
            .api
            .login(identifier, secret)
            .await
            .map_err(|e| match e {
                Error::Gateway(message) => Error::Authentication(message),
                other => other,
            })?;

        if outcome.password_expired {
            let email = outcome
                .user
                .and_then(|u| u.email)
                .or_else(|| is_valid_email(identifier).then(|| identifier.to_owned()));
            tracing::info!("Login refused: password expired");
            return Err(Error::CredentialExpired {
                message: outcome.message,
                email,
            });
        }
        if !outcome.success {
            return Err(Error::Authentication(outcome.message));
        }
        let user = outcome.user.ok_or_else(|| Error::Transport {
            operation: LOGIN.name,
            status: None,
            detail: "login succeeded without a user record".into(),
        })?;

        let token = Ulid::new().to_string();
        self.persist(&user, &token).await?;

        tracing::info!(user_id = %user.id, tier = %user.tier, "Login successful");
        self.state.send_modify(|s| {
            s.active = Some(ActiveSession {
                token,
                user: user.clone(),
            });
        });
        Ok(user)
    }

    /// Write both keys; on failure put the store back the way it was.
    async fn persist(&self, user: &User, token: &str) -> Result<(), Error> {
        let record = serde_json::to_string(user).map_err(Error::storage)?;
        let Err(e) = self.write_pair(&record, token).await else {
            return Ok(());
        };
        tracing::error!(error = %e, "Failed to persist session, rolling back");

        let previous = self.state.borrow().active.clone();
        match previous {
            Some(prev) => {
                let restored = match serde_json::to_string(&prev.user) {
                    Ok(record) => self.write_pair(&record, &prev.token).await,
                    Err(e) => Err(e.into()),
                };
                if let Err(e) = restored {
                    tracing::warn!(error = %e, "Failed to re-persist previous session");
                }
            }
            None => self.clear_storage().await,
        }
        Err(Error::storage(e))
    }

    async fn write_pair(&self, record: &str, token: &str) -> Result<(), StoreError> {
        self.store.set(USER_KEY, record).await?;
        self.store.set(TOKEN_KEY, token).await
    }

    // ── Logout ─────────────────────────────────────────────────────────

    /// End the session. Idempotent and never fails; storage errors are logged.
    pub async fn logout(&self) {
        self.stop_polling();
        self.state.send_modify(|s| s.active = None);
        self.clear_storage().await;
        tracing::info!("Logged out");
    }

    async fn clear_storage(&self) {
        for key in [USER_KEY, TOKEN_KEY] {
            if let Err(e) = self.store.remove(key).await {
                tracing::warn!(key, error = %e, "Failed to remove stored session key");
            }
        }
    }

    // ── Tier refresh ───────────────────────────────────────────────────

    /// Re-query the logged-in user's tier and apply it if it changed.
    ///
    /// Meant for an unattended timer: errors are logged, never returned.
    pub async fn refresh_tier(&self) {
        let cached = self.state.borrow().user().cloned();
        let Some(cached) = cached else {
            return;
        };
        if let Err(e) = self.try_refresh_tier(&cached).await {
            tracing::warn!(user_id = %cached.id, error = %e, "Failed to check status");
        }
    }

    async fn try_refresh_tier(&self, cached: &User) -> Result<(), Error> {
        let Some(status) = self.api.check_status(cached.id).await? else {
            tracing::debug!(user_id = %cached.id, "Status check found no account");
            return Ok(());
        };
        if status.tier == cached.tier {
            return Ok(());
        }

        // The session may have been replaced while the request was in flight.
        let mut updated = None;
        self.state.send_if_modified(|s| match &mut s.active {
            Some(active) if active.user.id == cached.id => {
                active.user.tier = status.tier.clone();
                updated = Some(active.user.clone());
                true
            }
            _ => false,
        });
        let Some(user) = updated else {
            return Ok(());
        };

        tracing::info!(user_id = %user.id, tier = %user.tier, "Tier changed");
        let record = serde_json::to_string(&user).map_err(Error::storage)?;
        self.store
            .set(USER_KEY, &record)
            .await
            .map_err(Error::storage)
    }

    /// Call [`refresh_tier`](Self::refresh_tier) every `interval` until the
    /// returned handle is stopped or dropped, or the user logs out.
    ///
    /// Only one poller runs per controller; starting another stops the first.
    /// Must be called from within a tokio runtime.
    pub fn start_tier_polling(self: &Arc<Self>, interval: Duration) -> PollHandle {
        let controller = Arc::downgrade(self);
        let handle = PollHandle::spawn(interval, move || {
            let controller = controller.clone();
            async move {
                let Some(controller) = controller.upgrade() else {
                    return false;
                };
                controller.refresh_tier().await;
                true
            }
        });

        let previous = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle.cancellation_token());
        if let Some(previous) = previous {
            previous.cancel();
        }
        handle
    }

    /// Stop the active poller, if any.
    pub fn stop_polling(&self) {
        let active = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = active {
            token.cancel();
        }
    }

    // ── Ordering ───────────────────────────────────────────────────────

    /// Submit `draft` for the logged-in user and clear it on success.
    ///
    /// # Errors
    ///
    /// [`Error::NotLoggedIn`] without a session, [`Error::EmptyOrder`] for an
    /// empty draft, or whatever the gateway reports.
    pub async fn submit_order(&self, draft: &mut OrderDraft) -> Result<Order, Error> {
        let user_id = self.state.borrow().user().map(|u| u.id);
        let user_id = user_id.ok_or(Error::NotLoggedIn)?;
        if draft.is_empty() {
            return Err(Error::EmptyOrder);
        }

        let order = self.api.create_order(user_id, &draft.item_names()).await?;
        tracing::info!(user_id = %user_id, order_id = %order.id, "Order submitted");
        draft.clear();
        Ok(order)
    }
}

/// Clears the busy flag when the login future completes or is dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::{Value as JsonValue, json};
    use tokio::sync::Notify;

    use super::*;
    use crate::api::tests::ScriptedGateway;
    use crate::gateway::{Operation, Variables};
    use crate::store::MemoryStore;
    use crate::types::{Tier, UserId};

    /// Memory store that counts writes and can be told to fail.
    #[derive(Clone, Default)]
    struct RecordingStore {
        inner: MemoryStore,
        sets: Arc<AtomicUsize>,
        fail_reads: Arc<AtomicBool>,
        fail_token_writes: Arc<AtomicBool>,
        fail_removes: Arc<AtomicBool>,
    }

    impl RecordingStore {
        fn sets(&self) -> usize {
            self.sets.load(Ordering::SeqCst)
        }

        async fn value(&self, key: &str) -> Option<String> {
            self.inner.get(key).await.unwrap()
        }
    }

    impl KeyValueStore for RecordingStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err("read failed".into());
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if key == TOKEN_KEY && self.fail_token_writes.load(Ordering::SeqCst) {
                return Err("disk full".into());
            }
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            if self.fail_removes.load(Ordering::SeqCst) {
                return Err("remove failed".into());
            }
            self.inner.remove(key).await
        }
    }

    fn alice_json(tier: &str) -> JsonValue {
        json!({"id": 7, "username": "alice", "email": "alice@x.com", "role": "CUSTOMER", "tier": tier})
    }

    fn login_ok(tier: &str) -> JsonValue {
        json!({"loginUser": {"success": true, "message": "Login successful", "user": alice_json(tier)}})
    }

    fn status(tier: &str) -> JsonValue {
        json!({"checkMyStatus": {"id": 7, "tier": tier}})
    }

    async fn controller(
        gateway: ScriptedGateway,
        store: RecordingStore,
    ) -> SessionController<ScriptedGateway, RecordingStore> {
        let controller = SessionController::new(gateway, store);
        controller.restore().await;
        controller
    }

    fn assert_paired(session: &Session) {
        assert_eq!(session.credential_token().is_some(), session.user().is_some());
    }

    // ── restore ──

    #[tokio::test]
    async fn starts_initializing_then_idle_after_restore() {
        let controller =
            SessionController::new(ScriptedGateway::default(), RecordingStore::default());
        assert_eq!(controller.route(), Route::Loading);

        controller.restore().await;
        let session = controller.session();
        assert_eq!(session.loading_state(), LoadingState::Idle);
        assert!(!session.is_logged_in());
        assert_eq!(controller.route(), Route::Unauthenticated);
    }

    #[tokio::test]
    async fn restore_picks_up_stored_session() {
        let store = RecordingStore::default();
        store.inner.set(USER_KEY, &alice_json("PREMIUM").to_string()).await.unwrap();
        store.inner.set(TOKEN_KEY, "t").await.unwrap();

        let controller = controller(ScriptedGateway::default(), store).await;
        let session = controller.session();
        assert_eq!(session.credential_token(), Some("t"));
        assert_eq!(session.user().unwrap().id, UserId(7));
        assert_eq!(controller.route(), Route::PremiumMenu);
    }

    #[tokio::test]
    async fn restore_swallows_corrupt_user_record() {
        let store = RecordingStore::default();
        store.inner.set(USER_KEY, "{not json").await.unwrap();
        store.inner.set(TOKEN_KEY, "t").await.unwrap();

        let controller = controller(ScriptedGateway::default(), store).await;
        let session = controller.session();
        assert_eq!(session.loading_state(), LoadingState::Idle);
        assert!(!session.is_logged_in());
        assert_paired(&session);
    }

    #[tokio::test]
    async fn restore_needs_both_keys() {
        let store = RecordingStore::default();
        store.inner.set(USER_KEY, &alice_json("SAVER").to_string()).await.unwrap();
        let controller = controller(ScriptedGateway::default(), store.clone()).await;
        assert!(!controller.session().is_logged_in());

        store.inner.set(TOKEN_KEY, "").await.unwrap();
        controller.restore().await;
        assert!(!controller.session().is_logged_in());
    }

    #[tokio::test]
    async fn restore_swallows_store_errors() {
        let store = RecordingStore::default();
        store.fail_reads.store(true, Ordering::SeqCst);
        let controller = controller(ScriptedGateway::default(), store).await;
        assert_eq!(controller.session().loading_state(), LoadingState::Idle);
        assert!(!controller.session().is_logged_in());
    }

    #[tokio::test]
    async fn restore_does_not_clobber_a_finished_login() {
        /// Parks token reads until released, after the value was read.
        #[derive(Clone, Default)]
        struct SlowReadStore {
            inner: MemoryStore,
            parked: Arc<Notify>,
            release: Arc<Notify>,
        }

        impl KeyValueStore for SlowReadStore {
            async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
                let value = self.inner.get(key).await?;
                if key == TOKEN_KEY {
                    self.parked.notify_one();
                    self.release.notified().await;
                }
                Ok(value)
            }

            async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
                self.inner.set(key, value).await
            }

            async fn remove(&self, key: &str) -> Result<(), StoreError> {
                self.inner.remove(key).await
            }
        }

        let store = SlowReadStore::default();
        let stale = json!({"id": 9, "username": "bob", "role": "CUSTOMER", "tier": "PREMIUM"});
        store.inner.set(USER_KEY, &stale.to_string()).await.unwrap();
        store.inner.set(TOKEN_KEY, "stale").await.unwrap();

        let gateway = ScriptedGateway::default().reply(login_ok("SAVER"));
        let controller = Arc::new(SessionController::new(gateway, store.clone()));
        let restoring = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.restore().await }
        });
        store.parked.notified().await;

        controller.login("alice", "secret1").await.unwrap();
        store.release.notify_one();
        restoring.await.unwrap();

        let session = controller.session();
        assert_eq!(session.loading_state(), LoadingState::Idle);
        assert_eq!(session.user().unwrap().id, UserId(7));
        assert_ne!(session.credential_token(), Some("stale"));
        assert_eq!(controller.route(), Route::SaverMenu);
    }

    // ── login ──

    #[tokio::test]
    async fn login_success_populates_and_persists() {
        let store = RecordingStore::default();
        let controller =
            controller(ScriptedGateway::default().reply(login_ok("SAVER")), store.clone()).await;

        let user = controller.login("alice", "secret1").await.unwrap();
        assert_eq!(user.id, UserId(7));

        let session = controller.session();
        assert_paired(&session);
        assert_eq!(session.user().unwrap().id, UserId(7));
        assert_eq!(controller.route(), Route::SaverMenu);

        let stored: User = serde_json::from_str(&store.value(USER_KEY).await.unwrap()).unwrap();
        assert_eq!(&stored, session.user().unwrap());
        assert_eq!(
            store.value(TOKEN_KEY).await.as_deref(),
            session.credential_token()
        );
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn failed_login_leaves_session_untouched() {
        let store = RecordingStore::default();
        let gateway = ScriptedGateway::default().reply(json!({
            "loginUser": {"success": false, "message": "bad password", "user": null}
        }));
        let controller = controller(gateway, store.clone()).await;
        let before = controller.session();

        let err = controller.login("alice", "nope").await.unwrap_err();
        assert!(matches!(err, Error::Authentication(msg) if msg == "bad password"));
        assert_eq!(controller.session(), before);
        assert_eq!(store.sets(), 0);
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn expired_password_is_distinguished() {
        let gateway = ScriptedGateway::default().reply(json!({
            "loginUser": {
                "success": false,
                "message": "Password has expired. Please reset your password.",
                "passwordExpired": true,
                "user": alice_json("SAVER")
            }
        }));
        let controller = controller(gateway, RecordingStore::default()).await;

        match controller.login("alice", "old").await.unwrap_err() {
            Error::CredentialExpired { message, email } => {
                assert_eq!(message, "Password has expired. Please reset your password.");
                assert_eq!(email.as_deref(), Some("alice@x.com"));
            }
            other => panic!("expected CredentialExpired, got {other:?}"),
        }
        assert!(!controller.session().is_logged_in());
    }

    #[tokio::test]
    async fn expired_password_falls_back_to_email_identifier() {
        let gateway = ScriptedGateway::default().reply(json!({
            "loginUser": {"success": false, "message": "expired", "passwordExpired": true, "user": null}
        }));
        let controller = controller(gateway, RecordingStore::default()).await;

        let err = controller.login("bob@x.com", "old").await.unwrap_err();
        assert!(matches!(err, Error::CredentialExpired { email: Some(e), .. } if e == "bob@x.com"));
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let gateway = ScriptedGateway::default().fail(Error::Transport {
            operation: "LoginUser",
            status: None,
            detail: "Cannot connect to the server.".into(),
        });
        let controller = controller(gateway, RecordingStore::default()).await;
        let before = controller.session();

        let err = controller.login("alice", "secret1").await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(controller.session(), before);
    }

    #[tokio::test]
    async fn gateway_errors_on_login_are_authentication_failures() {
        let gateway = ScriptedGateway::default().fail(Error::Gateway("Invalid credentials".into()));
        let store = RecordingStore::default();
        let controller = controller(gateway, store.clone()).await;
        let before = controller.session();

        let err = controller.login("alice", "bad").await.unwrap_err();
        assert!(matches!(err, Error::Authentication(msg) if msg == "Invalid credentials"));
        assert_eq!(controller.session(), before);
        assert_eq!(store.sets(), 0);
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn storage_failure_rolls_back() {
        let store = RecordingStore::default();
        store.fail_token_writes.store(true, Ordering::SeqCst);
        let controller =
            controller(ScriptedGateway::default().reply(login_ok("SAVER")), store.clone()).await;

        let err = controller.login("alice", "secret1").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        let session = controller.session();
        assert!(!session.is_logged_in());
        assert_paired(&session);
        assert_eq!(store.value(USER_KEY).await, None);
        assert_eq!(store.value(TOKEN_KEY).await, None);
    }

    #[tokio::test]
    async fn storage_failure_keeps_previous_session() {
        let store = RecordingStore::default();
        let gateway = ScriptedGateway::default()
            .reply(login_ok("SAVER"))
            .reply(login_ok("PREMIUM"));
        let controller = controller(gateway, store.clone()).await;
        controller.login("alice", "secret1").await.unwrap();
        let before = controller.session();

        store.fail_token_writes.store(true, Ordering::SeqCst);
        let err = controller.login("alice", "secret1").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(controller.session(), before);

        let stored: User = serde_json::from_str(&store.value(USER_KEY).await.unwrap()).unwrap();
        assert_eq!(stored.tier, Tier::Saver);
        assert_eq!(store.value(TOKEN_KEY).await.as_deref(), before.credential_token());
    }

    #[tokio::test]
    async fn concurrent_login_is_rejected_while_busy() {
        struct GatedGateway {
            gate: Notify,
            inner: ScriptedGateway,
        }

        impl Gateway for GatedGateway {
            async fn execute(
                &self,
                operation: &Operation,
                variables: Variables,
            ) -> Result<JsonValue, Error> {
                self.gate.notified().await;
                self.inner.execute(operation, variables).await
            }
        }

        let gateway = GatedGateway {
            gate: Notify::new(),
            inner: ScriptedGateway::default().reply(login_ok("SAVER")),
        };
        let controller = Arc::new(SessionController::new(gateway, RecordingStore::default()));
        controller.restore().await;

        let first = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.login("alice", "secret1").await }
        });
        while !controller.is_busy() {
            tokio::task::yield_now().await;
        }

        let second = controller.login("alice", "secret1").await;
        assert!(matches!(second, Err(Error::Busy)));

        controller.api().gateway().gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert!(!controller.is_busy());
    }

    // ── logout ──

    #[tokio::test]
    async fn logout_twice_is_safe() {
        let store = RecordingStore::default();
        let controller =
            controller(ScriptedGateway::default().reply(login_ok("SAVER")), store.clone()).await;
        controller.login("alice", "secret1").await.unwrap();

        controller.logout().await;
        controller.logout().await;

        let session = controller.session();
        assert!(!session.is_logged_in());
        assert_paired(&session);
        assert!(store.inner.snapshot().await.is_empty());
        assert_eq!(controller.route(), Route::Unauthenticated);
    }

    #[tokio::test]
    async fn logout_ignores_storage_errors() {
        let store = RecordingStore::default();
        let controller =
            controller(ScriptedGateway::default().reply(login_ok("SAVER")), store.clone()).await;
        controller.login("alice", "secret1").await.unwrap();

        store.fail_removes.store(true, Ordering::SeqCst);
        controller.logout().await;
        assert!(!controller.session().is_logged_in());
    }

    // ── refresh_tier ──

    #[tokio::test]
    async fn refresh_without_user_makes_no_call() {
        let controller = controller(ScriptedGateway::default(), RecordingStore::default()).await;
        controller.refresh_tier().await;
        assert!(controller.api().gateway().call_names().is_empty());
    }

    #[tokio::test]
    async fn refresh_with_same_tier_does_not_write() {
        let store = RecordingStore::default();
        let gateway = ScriptedGateway::default()
            .reply(login_ok("PENDING"))
            .reply(status("PENDING"));
        let controller = controller(gateway, store.clone()).await;
        controller.login("alice", "secret1").await.unwrap();
        let writes = store.sets();

        controller.refresh_tier().await;
        assert_eq!(store.sets(), writes);
        assert_eq!(controller.route(), Route::Waiting);
    }

    #[tokio::test]
    async fn refresh_with_new_tier_updates_memory_and_store_once() {
        let store = RecordingStore::default();
        let gateway = ScriptedGateway::default()
            .reply(login_ok("PENDING"))
            .reply(status("SAVER"));
        let controller = controller(gateway, store.clone()).await;
        controller.login("alice", "secret1").await.unwrap();
        let token = controller.session().credential_token().map(str::to_owned);
        let writes = store.sets();

        controller.refresh_tier().await;
        assert_eq!(store.sets(), writes + 1);
        assert_eq!(controller.session().user().unwrap().tier, Tier::Saver);
        assert_eq!(controller.session().credential_token().map(str::to_owned), token);

        let stored: User = serde_json::from_str(&store.value(USER_KEY).await.unwrap()).unwrap();
        assert_eq!(stored.tier, Tier::Saver);
        assert_eq!(controller.route(), Route::SaverMenu);
    }

    #[tokio::test]
    async fn refresh_errors_are_swallowed() {
        let gateway = ScriptedGateway::default()
            .reply(login_ok("PENDING"))
            .fail(Error::Gateway("boom".into()))
            .reply(json!({"checkMyStatus": null}));
        let controller = controller(gateway, RecordingStore::default()).await;
        controller.login("alice", "secret1").await.unwrap();

        controller.refresh_tier().await;
        controller.refresh_tier().await;
        assert_eq!(controller.session().user().unwrap().tier, Tier::Pending);
    }

    // ── notifications & polling ──

    #[tokio::test]
    async fn subscribers_see_login_and_logout() {
        let gateway = ScriptedGateway::default().reply(login_ok("PREMIUM"));
        let controller = controller(gateway, RecordingStore::default()).await;
        let mut rx = controller.subscribe();

        controller.login("alice", "secret1").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(derive_route(&rx.borrow_and_update()), Route::PremiumMenu);

        controller.logout().await;
        rx.changed().await.unwrap();
        assert_eq!(derive_route(&rx.borrow_and_update()), Route::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_moves_waiting_user_to_menu() {
        let gateway = ScriptedGateway::default()
            .reply(login_ok("PENDING"))
            .reply(status("PENDING"))
            .reply(status("SAVER"));
        let controller = Arc::new(controller(gateway, RecordingStore::default()).await);
        controller.login("alice", "secret1").await.unwrap();
        assert!(controller.route().polls_tier());

        let poller = controller.start_tier_polling(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(controller.route(), Route::Waiting);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(controller.route(), Route::SaverMenu);

        poller.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(controller.api().gateway().call_names().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_poller_and_logout_stops_it() {
        let controller = controller(ScriptedGateway::default(), RecordingStore::default()).await;
        let controller = Arc::new(controller);

        let first = controller.start_tier_polling(Duration::from_secs(5));
        let second = controller.start_tier_polling(Duration::from_secs(5));
        assert!(!first.is_active());
        assert!(second.is_active());

        controller.logout().await;
        assert!(!second.is_active());
    }

    // ── ordering ──

    #[tokio::test]
    async fn submit_order_uses_session_user_and_clears_draft() {
        let gateway = ScriptedGateway::default()
            .reply(login_ok("SAVER"))
            .reply(json!({"createOrder": {"id": 1, "items": ["ไข่ไก่-2"]}}));
        let controller = controller(gateway, RecordingStore::default()).await;
        controller.login("alice", "secret1").await.unwrap();

        let mut draft = OrderDraft::new();
        draft.adjust("ไข่ไก่", 2).unwrap();
        let order = controller.submit_order(&mut draft).await.unwrap();

        assert_eq!(order.lines()[0].quantity, 2);
        assert!(draft.is_empty());
        let calls = controller.api().gateway().calls.lock().unwrap();
        assert_eq!(calls[1].1["userId"], 7);
    }

    #[tokio::test]
    async fn submit_order_preconditions() {
        let gateway = ScriptedGateway::default().reply(login_ok("SAVER"));
        let controller = controller(gateway, RecordingStore::default()).await;
        let mut draft = OrderDraft::new();
        draft.adjust("ชีส", 1).unwrap();
        assert!(matches!(
            controller.submit_order(&mut draft).await,
            Err(Error::NotLoggedIn)
        ));

        controller.login("alice", "secret1").await.unwrap();
        let mut empty = OrderDraft::new();
        assert!(matches!(
            controller.submit_order(&mut empty).await,
            Err(Error::EmptyOrder)
        ));
    }
}
