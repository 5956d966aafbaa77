//! Client auth store: drives the guard from the identity provider and carries
//! out its effects.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

use super::{BootstrapGuard, GuardEffect, GuardView};
use crate::session::routes::SIGN_IN_PATH;

/// The third-party identity provider as seen from the client.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Live authentication state: one message per provider callback, carrying
    /// the current subject or `None` when signed out.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<Option<String>>;

    /// A freshly minted ID token for the signed-in user, if any.
    async fn id_token(&self) -> Result<Option<String>>;

    async fn sign_out(&self) -> Result<()>;
}

/// Calls to the server's session endpoint.
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn create_session(&self, id_token: &str) -> Result<()>;
    async fn clear_session(&self) -> Result<()>;
}

pub trait Navigator: Send + Sync {
    /// Client-side navigation replacing the current history entry.
    fn replace(&self, location: &str);
    /// Full page load; discards preloaded client routes.
    fn assign(&self, location: &str);
}

pub struct AuthStore {
    identity: Arc<dyn IdentityProvider>,
    sessions: Arc<dyn SessionClient>,
    navigator: Arc<dyn Navigator>,
    guard: Mutex<BootstrapGuard>,
    initialized: AtomicBool,
}

impl AuthStore {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        sessions: Arc<dyn SessionClient>,
        navigator: Arc<dyn Navigator>,
        path: &str,
        query: Option<&str>,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity,
            sessions,
            navigator,
            guard: Mutex::new(BootstrapGuard::new(path, query)),
            initialized: AtomicBool::new(false),
        })
    }

    /// Subscribe to the identity provider. Only the first call has any effect.
    ///
    /// Returns `true` when this call created the subscription.
    pub fn init(self: &Arc<Self>) -> bool {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return false;
        }
        let mut updates = self.identity.subscribe();
        let store = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(subject) = updates.recv().await {
                debug!(signed_in = subject.is_some(), "auth state changed");
                let effects = store.guard.lock().await.on_auth_state(subject);
                store.apply(effects);
            }
        });
        true
    }

    /// Report a client-side route change to the guard.
    pub async fn route_changed(&self, path: &str, query: Option<&str>) {
        let effects = self.guard.lock().await.on_route_change(path, query);
        self.apply(effects);
    }

    pub async fn view(&self) -> GuardView {
        self.guard.lock().await.view()
    }

    pub async fn subject(&self) -> Option<String> {
        self.guard.lock().await.subject().map(str::to_string)
    }

    /// Exchange a fresh ID token for a server session. Failures are logged and
    /// reported as `false`.
    pub async fn sign_in(&self) -> bool {
        let id_token = match self.identity.id_token().await {
            Ok(Some(token)) => token,
            Ok(None) => return false,
            Err(err) => {
                error!("Error signing in: {err:#}");
                return false;
            }
        };
        match self.sessions.create_session(&id_token).await {
            Ok(()) => true,
            Err(err) => {
                error!("Failed to create session: {err:#}");
                false
            }
        }
    }

    /// Clear the server cookies, sign out of the provider, then reload on sign-in.
    pub async fn sign_out(&self) {
        let result = async {
            self.sessions.clear_session().await?;
            self.identity.sign_out().await?;
            self.navigator.assign(SIGN_IN_PATH);
            Ok::<(), anyhow::Error>(())
        }
        .await;
        if let Err(err) = result {
            error!("Error signing out: {err:#}");
        }
    }

    fn apply(&self, effects: Vec<GuardEffect>) {
        for effect in effects {
            match effect {
                GuardEffect::ReplaceNavigation(location) => self.navigator.replace(&location),
                GuardEffect::ClearServerSession => {
                    let sessions = Arc::clone(&self.sessions);
                    tokio::spawn(async move {
                        if let Err(err) = sessions.clear_session().await {
                            error!("Failed to clear session on sign out: {err:#}");
                        }
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::{
        sync::{atomic::AtomicUsize, Mutex as StdMutex},
        time::Duration,
    };
    use tokio::time::timeout;

    struct FakeIdentity {
        updates: StdMutex<Option<mpsc::UnboundedReceiver<Option<String>>>>,
        subscriptions: AtomicUsize,
        token: Option<String>,
        signed_out: AtomicBool,
    }

    impl FakeIdentity {
        fn new(token: Option<&str>) -> (Arc<Self>, mpsc::UnboundedSender<Option<String>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let identity = Arc::new(Self {
                updates: StdMutex::new(Some(rx)),
                subscriptions: AtomicUsize::new(0),
                token: token.map(str::to_string),
                signed_out: AtomicBool::new(false),
            });
            (identity, tx)
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        fn subscribe(&self) -> mpsc::UnboundedReceiver<Option<String>> {
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            self.updates
                .lock()
                .expect("lock")
                .take()
                .expect("subscribed twice")
        }

        async fn id_token(&self) -> Result<Option<String>> {
            Ok(self.token.clone())
        }

        async fn sign_out(&self) -> Result<()> {
            self.signed_out.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeSessions {
        fail: bool,
        events: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl SessionClient for FakeSessions {
        async fn create_session(&self, id_token: &str) -> Result<()> {
            let _ = self.events.send(format!("create:{id_token}"));
            if self.fail {
                Err(anyhow!("500 Internal Server Error"))
            } else {
                Ok(())
            }
        }

        async fn clear_session(&self) -> Result<()> {
            let _ = self.events.send("clear".to_string());
            if self.fail {
                Err(anyhow!("network down"))
            } else {
                Ok(())
            }
        }
    }

    struct FakeNavigator {
        events: mpsc::UnboundedSender<String>,
    }

    impl Navigator for FakeNavigator {
        fn replace(&self, location: &str) {
            let _ = self.events.send(format!("replace:{location}"));
        }

        fn assign(&self, location: &str) {
            let _ = self.events.send(format!("assign:{location}"));
        }
    }

    struct Harness {
        store: Arc<AuthStore>,
        identity: Arc<FakeIdentity>,
        provider: mpsc::UnboundedSender<Option<String>>,
        sessions: mpsc::UnboundedReceiver<String>,
        navigation: mpsc::UnboundedReceiver<String>,
    }

    fn harness(path: &str, token: Option<&str>, fail: bool) -> Harness {
        let (identity, provider) = FakeIdentity::new(token);
        let (session_tx, sessions) = mpsc::unbounded_channel();
        let (nav_tx, navigation) = mpsc::unbounded_channel();
        let store = AuthStore::new(
            identity.clone(),
            Arc::new(FakeSessions {
                fail,
                events: session_tx,
            }),
            Arc::new(FakeNavigator { events: nav_tx }),
            path,
            None,
        );
        Harness {
            store,
            identity,
            provider,
            sessions,
            navigation,
        }
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<String>) -> Option<String> {
        timeout(Duration::from_secs(1), events.recv()).await.ok().flatten()
    }

    #[tokio::test]
    async fn init_subscribes_once() {
        let h = harness("/", None, false);
        assert!(h.store.init());
        assert!(!h.store.init());
        assert!(!h.store.init());
        assert_eq!(h.identity.subscriptions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn signed_out_callback_redirects_and_clears_cookies() {
        let mut h = harness("/dashboard", None, false);
        assert_eq!(h.store.view().await, GuardView::Loading);
        h.store.init();
        h.provider.send(None).expect("send");

        assert_eq!(
            next_event(&mut h.navigation).await.as_deref(),
            Some("replace:/signin?next=%2Fdashboard")
        );
        assert_eq!(next_event(&mut h.sessions).await.as_deref(), Some("clear"));
    }

    #[tokio::test]
    async fn failed_cookie_clear_never_blocks_navigation() {
        let mut h = harness("/habits", None, true);
        h.store.init();
        h.provider.send(None).expect("send");
        assert_eq!(
            next_event(&mut h.navigation).await.as_deref(),
            Some("replace:/signin?next=%2Fhabits")
        );
        assert_eq!(next_event(&mut h.sessions).await.as_deref(), Some("clear"));
    }

    #[tokio::test]
    async fn signed_in_callback_shows_content() {
        let mut h = harness("/goals", None, false);
        h.store.init();
        h.provider.send(Some("user-1".to_string())).expect("send");
        for _ in 0..50 {
            if h.store.view().await == GuardView::Content {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.store.view().await, GuardView::Content);
        assert_eq!(h.store.subject().await.as_deref(), Some("user-1"));
        assert!(h.navigation.try_recv().is_err());
        assert!(h.sessions.try_recv().is_err());
    }

    #[tokio::test]
    async fn sign_in_posts_fresh_token() {
        let mut h = harness("/signin", Some("header.payload.signature"), false);
        assert!(h.store.sign_in().await);
        assert_eq!(
            next_event(&mut h.sessions).await.as_deref(),
            Some("create:header.payload.signature")
        );
    }

    #[tokio::test]
    async fn sign_in_reports_failures() {
        let h = harness("/signin", None, false);
        assert!(!h.store.sign_in().await);

        let failing = harness("/signin", Some("header.payload.signature"), true);
        assert!(!failing.store.sign_in().await);
    }

    #[tokio::test]
    async fn sign_out_clears_then_reloads_sign_in() {
        let mut h = harness("/profile", None, false);
        h.store.sign_out().await;
        assert_eq!(next_event(&mut h.sessions).await.as_deref(), Some("clear"));
        assert!(h.identity.signed_out.load(Ordering::SeqCst));
        assert_eq!(
            next_event(&mut h.navigation).await.as_deref(),
            Some("assign:/signin")
        );
    }

    #[tokio::test]
    async fn sign_out_failure_is_swallowed() {
        let mut h = harness("/profile", None, true);
        h.store.sign_out().await;
        assert!(!h.identity.signed_out.load(Ordering::SeqCst));
        assert!(h.navigation.try_recv().is_err());
    }
}
