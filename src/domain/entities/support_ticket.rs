use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    Technical,
    Billing,
    Account,
    Subscription,
    Feedback,
    Other,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone)]
pub struct SupportTicket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ticket_number: String,
    pub issue_type: IssueType,
    pub description: String,
    pub attachment_url: Option<String>,
    pub status: TicketStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewSupportTicket {
    pub user_id: Uuid,
    pub issue_type: IssueType,
    pub description: String,
    pub attachment_url: Option<String>,
}

const TICKET_SUFFIX_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Globally unique, human-quotable ticket number: millisecond timestamp in
/// base36 plus a random 4-character suffix.
pub fn generate_ticket_number(now_millis: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| TICKET_SUFFIX_CHARS[rng.gen_range(0..TICKET_SUFFIX_CHARS.len())] as char)
        .collect();
    format!("PRJ-{}-{}", to_base36(now_millis), suffix)
}

fn to_base36(mut value: i64) -> String {
    if value <= 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(TICKET_SUFFIX_CHARS[(value % 36) as usize] as char);
        value /= 36;
    }
    out.reverse();
    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_number_has_expected_shape() {
        let number = generate_ticket_number(1_700_000_000_000);
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "PRJ");
        assert!(!parts[1].is_empty());
        assert_eq!(parts[2].len(), 4);
    }

    #[test]
    fn base36_roundtrips_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
    }
}
