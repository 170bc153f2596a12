//! Session observer: the login panel's always-current view of who is signed in.
//!
//! State flows one way. The authority's change feed is the source of truth for
//! `user`; [`SessionObserver::initialize`] only seeds the first paint of a
//! mount and never writes `user` once a notification has been applied.
//!
//! Every state mutation runs inside one `watch::Sender::send_if_modified`
//! closure, so each event handler is atomic with respect to the others.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use panel_core::{
    AuthChangeEvent, AuthPhase, OAuthProvider, SessionChange, UiAuthState, User, UserStore,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::authority::{AuthAuthority, AuthNotice, OAuthRedirect, SignInOptions};
use crate::error::{AuthError, BackendError};
use crate::mirror::IdentityMirror;

/// Construction options for a [`SessionObserver`].
#[derive(Debug, Clone, Default)]
pub struct ObserverOptions {
    /// Callback address forwarded with every sign-in.
    pub redirect_to: Option<String>,
}

/// Drives [`UiAuthState`] from an [`AuthAuthority`] and mirrors every observed
/// user through an [`IdentityMirror`].
///
/// Cheap to clone; clones share state.
pub struct SessionObserver<A, S> {
    inner: Arc<Inner<A, S>>,
}

impl<A, S> Clone for SessionObserver<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<A, S> {
    authority: Arc<A>,
    mirror: IdentityMirror<S>,
    options: ObserverOptions,
    state: watch::Sender<UiAuthState>,
    /// False once the view is unmounted; results arriving later are dropped.
    active: AtomicBool,
    /// Bumped on unmount so requests started by an earlier mount are discarded.
    generation: AtomicU64,
    /// Count of change notifications applied during this mount.
    notifications: AtomicU64,
    /// `initialize` has written `user` during this mount.
    seeded: AtomicBool,
    /// Set once anything has touched the state.
    started: AtomicBool,
    /// A sign-in redirect is waiting for its change notification.
    sign_in_pending: AtomicBool,
}

/// Handle for a registered change listener.
///
/// Cancelled explicitly with [`Subscription::cancel`] or implicitly on drop.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    live: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop listening. No notification changes state after this returns.
    pub fn cancel(mut self) {
        self.stop();
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<A: AuthAuthority, S: UserStore + 'static> SessionObserver<A, S> {
    pub fn new(authority: Arc<A>, mirror: IdentityMirror<S>, options: ObserverOptions) -> Self {
        let (state, _) = watch::channel(UiAuthState::default());
        Self {
            inner: Arc::new(Inner {
                authority,
                mirror,
                options,
                state,
                active: AtomicBool::new(true),
                generation: AtomicU64::new(0),
                notifications: AtomicU64::new(0),
                seeded: AtomicBool::new(false),
                started: AtomicBool::new(false),
                sign_in_pending: AtomicBool::new(false),
            }),
        }
    }

    /// Snapshot of the current UI state.
    #[must_use]
    pub fn state(&self) -> UiAuthState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that wakes on every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<UiAuthState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn phase(&self) -> AuthPhase {
        self.inner.phase_of(&self.inner.state.borrow())
    }

    #[must_use]
    pub fn authority(&self) -> &Arc<A> {
        &self.inner.authority
    }

    /// Activate the view: start listening, then fetch the current session.
    ///
    /// Session-fetch failures are already reflected in the state; the returned
    /// subscription must be kept alive for as long as the view is shown.
    pub async fn mount(&self) -> Subscription {
        self.inner.active.store(true, Ordering::SeqCst);
        let subscription = self.subscribe();
        if let Err(error) = self.initialize().await {
            tracing::debug!(%error, "mounted without a session");
        }
        subscription
    }

    /// Deactivate the view. In-flight requests may finish but their results
    /// are discarded.
    pub fn unmount(&self, subscription: Subscription) {
        subscription.cancel();
        self.inner.active.store(false, Ordering::SeqCst);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.notifications.store(0, Ordering::SeqCst);
        self.inner.seeded.store(false, Ordering::SeqCst);
        self.inner.sign_in_pending.store(false, Ordering::SeqCst);
        tracing::debug!("session observer unmounted");
    }

    /// Fetch the current session once and seed `user` from it.
    ///
    /// Only the first successful call of a mount, made before any change
    /// notification was applied, writes `user`. Later calls just settle
    /// `is_loading` and `error`. A failure sets `error` and leaves `user` as
    /// it is, which on first paint means logged out.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionFetch` when the authority fails. The error is
    /// recorded in the state before it is returned.
    pub async fn initialize(&self) -> Result<Option<User>, AuthError> {
        let inner = &self.inner;
        let generation = inner.generation.load(Ordering::SeqCst);

        inner.update(generation, "initialize", |state| {
            !std::mem::replace(&mut state.is_loading, true)
        });

        match inner.authority.get_session().await {
            Ok(session) => {
                let user = session.map(|s| s.user);
                let mut seeded = false;
                inner.update(generation, "initialize", |state| {
                    state.is_loading = false;
                    state.error = None;
                    if inner.notifications.load(Ordering::SeqCst) == 0
                        && !inner.seeded.swap(true, Ordering::SeqCst)
                    {
                        state.user.clone_from(&user);
                        seeded = true;
                    }
                    true
                });
                if seeded {
                    if let Some(user) = &user {
                        inner.mirror_best_effort(user).await;
                    }
                } else {
                    tracing::debug!("user already owned by the change feed; not re-seeding");
                }
                Ok(user)
            }
            Err(backend) => {
                let error = AuthError::SessionFetch(backend);
                tracing::warn!(%error, "session fetch failed; keeping current user");
                inner.update(generation, "initialize", |state| {
                    state.is_loading = false;
                    state.error = error.user_message().map(str::to_string);
                    true
                });
                Err(error)
            }
        }
    }

    /// Register the persistent change listener.
    ///
    /// Each notification sets `user` to the notified session's user (or none),
    /// clears `error` and, when a user is present, mirrors it. A `SIGNED_IN`
    /// notification also completes a pending sign-in; a sign-in failure notice
    /// ends it with an error.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn subscribe(&self) -> Subscription {
        let mut changes = self.inner.authority.on_session_change();
        let live = Arc::new(AtomicBool::new(true));
        let inner = Arc::clone(&self.inner);
        let task_live = Arc::clone(&live);
        let generation = inner.generation.load(Ordering::SeqCst);

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(AuthNotice::Changed(change)) => {
                        inner.handle_change(generation, &task_live, change).await;
                    }
                    Ok(AuthNotice::SignInFailed { provider, error }) => {
                        inner.handle_sign_in_failure(generation, &task_live, provider, error);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session listener lagged; newer events still apply");
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("session change feed closed");
                        break;
                    }
                }
            }
        });

        Subscription {
            live,
            task: Some(task),
        }
    }

    /// Ask the authority to start the OAuth redirect flow for `provider`.
    ///
    /// On success the view stays loading until the resulting `SIGNED_IN`
    /// notification, or a sign-in failure notice, arrives.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OAuthStart` when the authority fails. The error is
    /// recorded in the state and `user` is left untouched.
    pub async fn sign_in(&self, provider: OAuthProvider) -> Result<OAuthRedirect, AuthError> {
        let inner = &self.inner;
        let generation = inner.generation.load(Ordering::SeqCst);

        inner.sign_in_pending.store(true, Ordering::SeqCst);
        inner.update(generation, "sign_in", |state| {
            state.is_loading = true;
            state.error = None;
            true
        });

        let options = SignInOptions {
            redirect_to: inner.options.redirect_to.clone(),
        };
        match inner.authority.sign_in_with_oauth(provider, options).await {
            Ok(redirect) => {
                tracing::info!(%provider, url = %redirect.url, "OAuth sign-in started");
                Ok(redirect)
            }
            Err(backend) => {
                let error = AuthError::OAuthStart(backend);
                tracing::error!(%provider, %error, "error logging in");
                inner.sign_in_pending.store(false, Ordering::SeqCst);
                inner.update(generation, "sign_in", |state| {
                    state.is_loading = false;
                    state.error = error.user_message().map(str::to_string);
                    true
                });
                Err(error)
            }
        }
    }

    /// Ask the authority to end the session.
    ///
    /// On success `user` is cleared immediately, without waiting for the
    /// change notification.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SignOut` when the authority fails. The error is
    /// recorded in the state and `user` is left untouched.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let inner = &self.inner;
        let generation = inner.generation.load(Ordering::SeqCst);

        inner.update(generation, "sign_out", |state| {
            state.is_loading = true;
            state.error = None;
            true
        });

        match inner.authority.sign_out().await {
            Ok(()) => {
                inner.sign_in_pending.store(false, Ordering::SeqCst);
                inner.update(generation, "sign_out", |state| {
                    state.user = None;
                    state.is_loading = false;
                    state.error = None;
                    true
                });
                tracing::info!("signed out");
                Ok(())
            }
            Err(backend) => {
                let error = AuthError::SignOut(backend);
                tracing::error!(%error, "error logging out");
                inner.update(generation, "sign_out", |state| {
                    state.is_loading = false;
                    state.error = error.user_message().map(str::to_string);
                    true
                });
                Err(error)
            }
        }
    }
}

impl<A: AuthAuthority, S: UserStore> Inner<A, S> {
    fn is_current(&self, generation: u64) -> bool {
        self.active.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    fn phase_of(&self, state: &UiAuthState) -> AuthPhase {
        if self.started.load(Ordering::SeqCst) {
            AuthPhase::of(state)
        } else {
            AuthPhase::Uninitialized
        }
    }

    /// Apply `mutate` if the view that issued the request is still current.
    ///
    /// Returns whether the mutation ran.
    fn update(
        &self,
        generation: u64,
        cause: &str,
        mutate: impl FnOnce(&mut UiAuthState) -> bool,
    ) -> bool {
        let mut ran = false;
        self.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            let before = self.phase_of(state);
            self.started.store(true, Ordering::SeqCst);
            let modified = mutate(state);
            ran = true;
            let after = AuthPhase::of(state);
            if before != after {
                tracing::debug!(
                    from = %before,
                    to = %after,
                    expected = before.can_transition_to(after),
                    cause,
                    "auth phase changed",
                );
            }
            modified
        });
        ran
    }

    async fn handle_change(&self, generation: u64, live: &AtomicBool, change: SessionChange) {
        let SessionChange { event, session } = change;
        let user = session.map(|s| s.user);

        let applied = self.update(generation, event.as_str(), |state| {
            if !live.load(Ordering::SeqCst) {
                return false;
            }
            self.notifications.fetch_add(1, Ordering::SeqCst);
            state.user.clone_from(&user);
            state.error = None;
            if event == AuthChangeEvent::SignedIn
                && self.sign_in_pending.swap(false, Ordering::SeqCst)
            {
                state.is_loading = false;
            }
            true
        });
        if !applied || !live.load(Ordering::SeqCst) {
            return;
        }

        tracing::info!(
            %event,
            user_id = user.as_ref().map(|u| u.id.as_str()),
            "auth state changed",
        );
        if let Some(user) = &user {
            self.mirror_best_effort(user).await;
        }
    }

    fn handle_sign_in_failure(
        &self,
        generation: u64,
        live: &AtomicBool,
        provider: OAuthProvider,
        backend: BackendError,
    ) {
        let error = AuthError::OAuthStart(backend);
        let mut ended = false;
        self.update(generation, "sign_in_failed", |state| {
            if !live.load(Ordering::SeqCst) || !self.sign_in_pending.swap(false, Ordering::SeqCst) {
                return false;
            }
            state.is_loading = false;
            state.error = error.user_message().map(str::to_string);
            ended = true;
            true
        });
        if ended {
            tracing::error!(%provider, %error, "error logging in");
        } else {
            tracing::debug!(%provider, %error, "ignoring sign-in failure with nothing pending");
        }
    }

    async fn mirror_best_effort(&self, user: &User) {
        if let Err(error) = self.mirror.mirror(user).await {
            tracing::warn!(
                %error,
                user_id = %user.id,
                "identity mirror failed; the next session change will retry",
            );
        }
    }
}
