use chrono::NaiveDateTime;

/// Tombstone written before a user record is destroyed. Keyed by lowercase
/// email and never deleted; it is what prevents a free-trial re-grant when
/// the same address registers again.
#[derive(Debug, Clone)]
pub struct DeletedEmail {
    pub email: String,
    pub has_used_free_trial: bool,
    pub delete_reason: Option<String>,
    pub created_at: NaiveDateTime,
}
