//! One-shot admin notices.
//!
//! Lifecycle operations queue notices on the context; rendering the settings
//! page drains the ones meant for the viewer, so each notice is shown
//! exactly once.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use checkout_pos_core::UserId;

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Error,
    Warning,
    Success,
    Info,
}

impl NoticeLevel {
    /// CSS modifier used by the settings template.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Error => "notice-error",
            Self::Warning => "notice-warning",
            Self::Success => "notice-success",
            Self::Info => "notice-info",
        }
    }
}

/// A message for the admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// Notice for an `kis_auth_error` callback code.
    #[must_use]
    pub fn for_auth_error(code: &str) -> Self {
        let message = match code {
            "wc" => "WooCommerce authorization failed.".to_string(),
            "kassa" => "Checkout POS authorization failed.".to_string(),
            "ADDON_NOT_SUBSCRIBED" => {
                "The WooCommerce add-on is not subscribed in Checkout POS.".to_string()
            }
            other => format!("Connecting failed. Error code: {other}"),
        };
        Self::error(message)
    }
}

/// Queue of notices waiting to be shown.
///
/// A notice is either addressed to one user or site-wide. Site-wide notices
/// come from events no admin triggered, such as a domain change seen at
/// start-up, and go to the first store manager who opens the page.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    pending: Mutex<Vec<(Option<UserId>, Notice)>>,
}

impl NoticeQueue {
    /// Queue a site-wide notice.
    pub fn push(&self, notice: Notice) {
        self.push_to(None, notice);
    }

    /// Queue a notice for `user` only.
    pub fn push_for(&self, user: UserId, notice: Notice) {
        self.push_to(Some(user), notice);
    }

    /// Queue a notice for `recipient`, or site-wide when `None`.
    pub fn push_to(&self, recipient: Option<UserId>, notice: Notice) {
        tracing::debug!(
            recipient = ?recipient.map(|id| id.as_i64()),
            level = ?notice.level,
            message = %notice.message,
            "Queued admin notice"
        );
        self.lock().push((recipient, notice));
    }

    /// Remove and return the notices `user` should see, oldest first.
    ///
    /// Notices addressed to other users stay queued.
    pub fn drain_for(&self, user: UserId) -> Vec<Notice> {
        let mut pending = self.lock();
        let (mine, others): (Vec<_>, Vec<_>) = std::mem::take(&mut *pending)
            .into_iter()
            .partition(|(recipient, _)| recipient.is_none_or(|id| id == user));
        *pending = others;
        mine.into_iter().map(|(_, notice)| notice).collect()
    }

    /// Number of queued notices for all users.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is queued for anyone.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Option<UserId>, Notice)>> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_auth_error_codes() {
        assert_eq!(
            Notice::for_auth_error("wc").message,
            "WooCommerce authorization failed."
        );
        assert_eq!(
            Notice::for_auth_error("kassa").message,
            "Checkout POS authorization failed."
        );
        assert!(
            Notice::for_auth_error("ADDON_NOT_SUBSCRIBED")
                .message
                .contains("not subscribed")
        );
    }

    #[test]
    fn test_unknown_auth_error_code_is_appended() {
        let notice = Notice::for_auth_error("TIMEOUT_42");
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "Connecting failed. Error code: TIMEOUT_42");
    }

    #[test]
    fn test_drain_empties_queue() {
        let queue = NoticeQueue::default();
        queue.push(Notice::success("one"));
        queue.push(Notice::warning("two"));
        assert_eq!(queue.len(), 2);

        let drained = queue.drain_for(UserId::new(1));
        assert_eq!(drained.len(), 2);
        assert_eq!(drained.first().map(|n| n.message.as_str()), Some("one"));
        assert!(queue.is_empty());
        assert!(queue.drain_for(UserId::new(1)).is_empty());
    }

    #[test]
    fn test_user_notices_stay_with_their_user() {
        let queue = NoticeQueue::default();
        queue.push_for(UserId::new(2), Notice::error("denied"));
        queue.push(Notice::warning("domain changed"));

        let first: Vec<_> = queue
            .drain_for(UserId::new(1))
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(first, vec!["domain changed"]);

        let second: Vec<_> = queue
            .drain_for(UserId::new(2))
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(second, vec!["denied"]);
        assert!(queue.is_empty());
    }
}
