use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::session::{Session, TravelProfile};

pub type SharedSession = Arc<Mutex<Session>>;

/// In-memory map of live sessions. Each record sits behind its own lock so a
/// long completion in one session never blocks another.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl SessionManager {
    pub async fn create(&self, profile: TravelProfile) -> Uuid {
        self.insert(Session::new(profile)).await
    }

    pub async fn insert(&self, session: Session) -> Uuid {
        let id = session.id;
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, Arc::new(Mutex::new(session)));
        metrics::counter!("tripseek_sessions_created_total").increment(1);
        metrics::gauge!("tripseek_active_sessions").set(sessions.len() as f64);
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(&id).is_some();
        metrics::gauge!("tripseek_active_sessions").set(sessions.len() as f64);
        removed
    }

    /// Swaps a session for its successor; the old id stops resolving.
    pub async fn replace(&self, old: Uuid, fresh: Session) -> Uuid {
        self.remove(old).await;
        self.insert(fresh).await
    }

    pub async fn list(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.sessions.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions idle for longer than `ttl`. Sessions locked by an
    /// in-flight request are skipped.
    pub async fn sweep_expired(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| match s.try_lock() {
            Ok(s) => (now - s.last_active).to_std().map(|idle| idle <= ttl).unwrap_or(true),
            Err(_) => true,
        });
        let expired = before - sessions.len();
        if expired > 0 {
            metrics::counter!("tripseek_sessions_expired_total").increment(expired as u64);
            metrics::gauge!("tripseek_active_sessions").set(sessions.len() as f64);
        }
        expired
    }
}

pub fn spawn_sweeper(manager: SessionManager, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let expired = manager.sweep_expired(ttl).await;
            if expired > 0 {
                tracing::info!(expired, "expired idle sessions");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_list_remove() {
        let mgr = SessionManager::default();
        let a = mgr.create(TravelProfile::default()).await;
        let b = mgr.create(TravelProfile::default()).await;
        assert_ne!(a, b);
        assert_eq!(mgr.len().await, 2);

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(mgr.list().await, expected);

        let s = mgr.get(a).await.unwrap();
        assert_eq!(s.lock().await.id, a);

        assert!(mgr.remove(a).await);
        assert!(!mgr.remove(a).await);
        assert!(mgr.get(a).await.is_none());
    }

    #[tokio::test]
    async fn replace_retires_old_id() {
        let mgr = SessionManager::default();
        let old = mgr.create(TravelProfile::default()).await;
        let fresh = Session::new(TravelProfile::default());
        let fresh_id = fresh.id;
        assert_eq!(mgr.replace(old, fresh).await, fresh_id);
        assert!(mgr.get(old).await.is_none());
        assert!(mgr.get(fresh_id).await.is_some());
    }

    #[tokio::test]
    async fn sweep_drops_idle_and_keeps_busy_sessions() {
        let mgr = SessionManager::default();
        let idle = mgr.create(TravelProfile::default()).await;
        let busy = mgr.create(TravelProfile::default()).await;
        let fresh = mgr.create(TravelProfile::default()).await;

        let stale = Utc::now() - chrono::Duration::hours(2);
        mgr.get(idle).await.unwrap().lock().await.last_active = stale;
        let busy_session = mgr.get(busy).await.unwrap();
        busy_session.lock().await.last_active = stale;

        let guard = busy_session.lock().await;
        let expired = mgr.sweep_expired(Duration::from_secs(60)).await;
        drop(guard);

        assert_eq!(expired, 1);
        assert!(mgr.get(idle).await.is_none());
        assert!(mgr.get(busy).await.is_some());
        assert!(mgr.get(fresh).await.is_some());
    }
}
