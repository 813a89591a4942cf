//! Inbox-style messaging between users and the hospital administrator

use crate::auth::AccountId;
use crate::clinic::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Shown in the inbox when the counterparty has no patient profile.
pub const UNKNOWN_PATIENT: &str = "Unknown Patient";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: RecordId,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

/// One inbox row per counterparty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboxEntry {
    pub patient_id: AccountId,
    pub patient_name: String,
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
}

/// Collapse `messages` involving `owner` to the latest message per
/// counterparty, newest first.
pub fn latest_per_counterparty(owner: AccountId, messages: &[ChatMessage]) -> Vec<(AccountId, &ChatMessage)> {
    let mut latest: HashMap<AccountId, &ChatMessage> = HashMap::new();
    for msg in messages {
        let other = if msg.sender_id == owner {
            msg.receiver_id
        } else if msg.receiver_id == owner {
            msg.sender_id
        } else {
            continue;
        };
        latest
            .entry(other)
            .and_modify(|cur| {
                if (msg.sent_at, msg.id) > (cur.sent_at, cur.id) {
                    *cur = msg;
                }
            })
            .or_insert(msg);
    }

    let mut rows: Vec<_> = latest.into_iter().collect();
    rows.sort_by(|a, b| (b.1.sent_at, b.1.id).cmp(&(a.1.sent_at, a.1.id)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn msg(id: RecordId, from: AccountId, to: AccountId, at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id,
            sender_id: from,
            receiver_id: to,
            content: format!("m{}", id),
            sent_at: at,
        }
    }

    #[test]
    fn test_latest_per_counterparty_orders_newest_first() {
        let t0 = Utc::now();
        let messages = vec![
            msg(1, 2, 1, t0),
            msg(2, 1, 2, t0 + Duration::seconds(5)),
            msg(3, 3, 1, t0 + Duration::seconds(2)),
            msg(4, 3, 4, t0 + Duration::seconds(9)),
        ];

        let rows = latest_per_counterparty(1, &messages);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 2);
        assert_eq!(rows[0].1.id, 2);
        assert_eq!(rows[1].0, 3);
    }
}
