use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// A signal update recently pushed to a user by DM.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub user_id: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

pub trait NotificationBoard: Send + Sync {
    fn record(&self, notification: Notification);
    /// Most recent notification for the user, if still inside the validity window.
    fn recent(&self, user_id: &str) -> Option<Notification>;
}

pub struct InMemoryNotifications {
    ttl: Duration,
    latest: Mutex<HashMap<String, Notification>>,
}

impl InMemoryNotifications {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::hours(1)),
            latest: Mutex::new(HashMap::new()),
        }
    }

    fn recent_at(&self, user_id: &str, now: DateTime<Utc>) -> Option<Notification> {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        match latest.get(user_id) {
            Some(n) if now - n.sent_at <= self.ttl => Some(n.clone()),
            Some(_) => {
                latest.remove(user_id);
                None
            }
            None => None,
        }
    }
}

impl NotificationBoard for InMemoryNotifications {
    fn record(&self, notification: Notification) {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        latest.insert(notification.user_id.clone(), notification);
    }

    fn recent(&self, user_id: &str) -> Option<Notification> {
        self.recent_at(user_id, Utc::now())
    }
}
