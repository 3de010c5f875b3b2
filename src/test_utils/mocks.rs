use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        auth::{DeletedEmailRepo, EmailSender, RefreshTokenRepo, UserRepo},
        exam::{ExamCounts, ExamResultRepo},
        otp::OtpRepo,
        settings::{PreferencesRepo, SupportTicketRepo},
        subscription::{PaymentRepo, SubscriptionRepo},
    },
    domain::entities::{
        deleted_email::DeletedEmail,
        exam_result::ExamResult,
        otp::{Otp, OtpPurpose},
        payment::{NewPayment, Payment, PaymentStatus},
        preferences::{Theme, UserPreferences},
        refresh_token::RefreshTokenRecord,
        subscription::{ExamMode, NewSubscription, Subscription},
        support_ticket::{NewSupportTicket, SupportTicket, TicketStatus},
        user::{NewUser, ProfileFields, SubscriptionStatus, User},
    },
};

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

// ============================================================================
// InMemoryUserRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryUserRepo {
    pub users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_raw(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    pub fn get_by_email_sync(&self, email: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned()
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.get_by_email_sync(email))
    }

    async fn find_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }

    async fn insert(&self, user: NewUser) -> AppResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("email taken".to_string()));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: None,
            last_name: None,
            middle_name: None,
            phone_number: None,
            is_verified: false,
            is_profile_complete: false,
            is_disabled: false,
            disabled_at: None,
            disable_reason: None,
            subscription_status: user.subscription_status,
            subscription_end_date: None,
            has_used_free_trial: user.has_used_free_trial,
            password_history: Vec::new(),
            created_at: now(),
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        self.users.lock().unwrap().remove(&user_id);
        Ok(())
    }

    async fn mark_verified(&self, user_id: Uuid) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(AppError::NotFound("User"))?;
        user.is_verified = true;
        Ok(())
    }

    async fn set_profile(&self, user_id: Uuid, profile: ProfileFields) -> AppResult<User> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(AppError::NotFound("User"))?;
        user.first_name = Some(profile.first_name);
        user.last_name = Some(profile.last_name);
        user.middle_name = profile.middle_name;
        user.phone_number = Some(profile.phone_number);
        user.is_profile_complete = true;
        Ok(user.clone())
    }

    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(AppError::NotFound("User"))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn update_password_with_history(
        &self,
        user_id: Uuid,
        password_hash: &str,
        history: Vec<String>,
    ) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(AppError::NotFound("User"))?;
        user.password_hash = password_hash.to_string();
        user.password_history = history;
        Ok(())
    }

    async fn disable(
        &self,
        user_id: Uuid,
        reason: &str,
        disabled_at: NaiveDateTime,
    ) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(AppError::NotFound("User"))?;
        user.is_disabled = true;
        user.disabled_at = Some(disabled_at);
        user.disable_reason = Some(reason.to_string());
        user.subscription_status = SubscriptionStatus::Inactive;
        Ok(())
    }

    async fn set_subscription(
        &self,
        user_id: Uuid,
        status: SubscriptionStatus,
        end_date: Option<NaiveDateTime>,
    ) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(AppError::NotFound("User"))?;
        user.subscription_status = status;
        if let Some(end) = end_date {
            user.subscription_end_date = Some(end);
        }
        Ok(())
    }
}

// ============================================================================
// InMemoryOtpRepo
// ============================================================================

/// Vec keeps insertion order, which stands in for created_at ordering when
/// two codes land within the same timestamp tick.
#[derive(Default)]
pub struct InMemoryOtpRepo {
    pub otps: Mutex<Vec<Otp>>,
}

impl InMemoryOtpRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unused_count(&self, user_id: Uuid, purpose: OtpPurpose) -> usize {
        self.otps
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.user_id == user_id && o.purpose == purpose && !o.used)
            .count()
    }

    pub fn last_code_sync(&self, user_id: Uuid, purpose: OtpPurpose) -> Option<String> {
        self.otps
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|o| o.user_id == user_id && o.purpose == purpose)
            .map(|o| o.code.clone())
    }

    pub fn expire_all(&self, user_id: Uuid) {
        let mut otps = self.otps.lock().unwrap();
        for otp in otps.iter_mut().filter(|o| o.user_id == user_id) {
            otp.expires_at = now() - Duration::seconds(1);
        }
    }

    pub fn backdate_created(&self, user_id: Uuid, seconds: i64) {
        let mut otps = self.otps.lock().unwrap();
        for otp in otps.iter_mut().filter(|o| o.user_id == user_id) {
            otp.created_at -= Duration::seconds(seconds);
        }
    }
}

#[async_trait]
impl OtpRepo for InMemoryOtpRepo {
    async fn retire_unused(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<u64> {
        let mut otps = self.otps.lock().unwrap();
        let mut retired = 0;
        for otp in otps
            .iter_mut()
            .filter(|o| o.user_id == user_id && o.purpose == purpose && !o.used)
        {
            otp.used = true;
            retired += 1;
        }
        Ok(retired)
    }

    async fn insert(
        &self,
        user_id: Uuid,
        code: &str,
        purpose: OtpPurpose,
        expires_at: NaiveDateTime,
    ) -> AppResult<Otp> {
        let otp = Otp {
            id: Uuid::new_v4(),
            user_id,
            code: code.to_string(),
            purpose,
            expires_at,
            used: false,
            attempts: 0,
            created_at: now(),
        };
        self.otps.lock().unwrap().push(otp.clone());
        Ok(otp)
    }

    async fn latest_unused(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<Option<Otp>> {
        Ok(self
            .otps
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|o| o.user_id == user_id && o.purpose == purpose && !o.used)
            .cloned())
    }

    async fn latest_any(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<Option<Otp>> {
        Ok(self
            .otps
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|o| o.user_id == user_id && o.purpose == purpose)
            .cloned())
    }

    async fn mark_used(&self, id: Uuid) -> AppResult<()> {
        let mut otps = self.otps.lock().unwrap();
        if let Some(otp) = otps.iter_mut().find(|o| o.id == id) {
            otp.used = true;
        }
        Ok(())
    }

    async fn increment_attempts(&self, id: Uuid) -> AppResult<i32> {
        let mut otps = self.otps.lock().unwrap();
        let otp = otps
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(AppError::NotFound("Otp"))?;
        otp.attempts += 1;
        Ok(otp.attempts)
    }

    async fn delete_for_user(&self, user_id: Uuid) -> AppResult<()> {
        self.otps.lock().unwrap().retain(|o| o.user_id != user_id);
        Ok(())
    }
}

// ============================================================================
// InMemoryRefreshTokenRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryRefreshTokenRepo {
    pub records: Mutex<Vec<RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for_user(&self, user_id: Uuid) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl RefreshTokenRepo for InMemoryRefreshTokenRepo {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: NaiveDateTime,
    ) -> AppResult<()> {
        self.records.lock().unwrap().push(RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            created_at: now(),
        });
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AppResult<Option<RefreshTokenRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.token_hash == token_hash)
            .cloned())
    }

    async fn delete_by_hash(&self, token_hash: &str) -> AppResult<u64> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.token_hash != token_hash);
        Ok((before - records.len()) as u64)
    }

    async fn delete_for_user(&self, user_id: Uuid) -> AppResult<()> {
        self.records.lock().unwrap().retain(|r| r.user_id != user_id);
        Ok(())
    }
}

// ============================================================================
// InMemoryDeletedEmailRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryDeletedEmailRepo {
    pub tombstones: Mutex<HashMap<String, DeletedEmail>>,
}

impl InMemoryDeletedEmailRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeletedEmailRepo for InMemoryDeletedEmailRepo {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<DeletedEmail>> {
        Ok(self.tombstones.lock().unwrap().get(email).cloned())
    }

    async fn insert(
        &self,
        email: &str,
        has_used_free_trial: bool,
        delete_reason: &str,
    ) -> AppResult<()> {
        self.tombstones.lock().unwrap().insert(
            email.to_string(),
            DeletedEmail {
                email: email.to_string(),
                has_used_free_trial,
                delete_reason: Some(delete_reason.to_string()),
                created_at: now(),
            },
        );
        Ok(())
    }
}

// ============================================================================
// InMemoryPreferencesRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryPreferencesRepo {
    pub prefs: Mutex<HashMap<Uuid, UserPreferences>>,
}

impl InMemoryPreferencesRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferencesRepo for InMemoryPreferencesRepo {
    async fn find(&self, user_id: Uuid) -> AppResult<Option<UserPreferences>> {
        Ok(self.prefs.lock().unwrap().get(&user_id).cloned())
    }

    async fn upsert(
        &self,
        user_id: Uuid,
        font_size: i16,
        theme: Theme,
    ) -> AppResult<UserPreferences> {
        let prefs = UserPreferences {
            user_id,
            font_size,
            theme,
        };
        self.prefs.lock().unwrap().insert(user_id, prefs.clone());
        Ok(prefs)
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        self.prefs.lock().unwrap().remove(&user_id);
        Ok(())
    }
}

// ============================================================================
// InMemorySupportTicketRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySupportTicketRepo {
    pub tickets: Mutex<Vec<SupportTicket>>,
}

impl InMemorySupportTicketRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SupportTicketRepo for InMemorySupportTicketRepo {
    async fn insert(
        &self,
        ticket_number: &str,
        ticket: NewSupportTicket,
    ) -> AppResult<SupportTicket> {
        let created = SupportTicket {
            id: Uuid::new_v4(),
            user_id: ticket.user_id,
            ticket_number: ticket_number.to_string(),
            issue_type: ticket.issue_type,
            description: ticket.description,
            attachment_url: ticket.attachment_url,
            status: TicketStatus::Open,
            created_at: now(),
        };
        self.tickets.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<SupportTicket>> {
        Ok(self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<Vec<Subscription>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for_user(&self, user_id: Uuid) -> usize {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn active_for_user(
        &self,
        user_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<Option<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.user_id == user_id && s.is_active && s.end_date > now)
            .cloned())
    }

    async fn insert(&self, subscription: NewSubscription) -> AppResult<Subscription> {
        let created = Subscription {
            id: Uuid::new_v4(),
            user_id: subscription.user_id,
            plan_type: subscription.plan_type,
            amount: subscription.amount,
            start_date: subscription.start_date,
            end_date: subscription.end_date,
            is_active: true,
            auto_renew: true,
            free_trials_used: Vec::new(),
            payment_reference: subscription.payment_reference,
            created_at: now(),
        };
        self.subscriptions.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn deactivate_all(&self, user_id: Uuid) -> AppResult<u64> {
        let mut subs = self.subscriptions.lock().unwrap();
        let mut touched = 0;
        for sub in subs.iter_mut().filter(|s| s.user_id == user_id && s.is_active) {
            sub.is_active = false;
            touched += 1;
        }
        Ok(touched)
    }

    async fn cancel_active(&self, user_id: Uuid) -> AppResult<u64> {
        let mut subs = self.subscriptions.lock().unwrap();
        let mut touched = 0;
        for sub in subs.iter_mut().filter(|s| s.user_id == user_id && s.is_active) {
            sub.is_active = false;
            sub.auto_renew = false;
            touched += 1;
        }
        Ok(touched)
    }

    async fn add_free_trial_mode(&self, subscription_id: Uuid, mode: ExamMode) -> AppResult<()> {
        let mut subs = self.subscriptions.lock().unwrap();
        let sub = subs
            .iter_mut()
            .find(|s| s.id == subscription_id)
            .ok_or(AppError::NotFound("Subscription"))?;
        if !sub.free_trials_used.contains(&mode) {
            sub.free_trials_used.push(mode);
        }
        Ok(())
    }
}

// ============================================================================
// InMemoryPaymentRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryPaymentRepo {
    pub payments: Mutex<Vec<Payment>>,
}

impl InMemoryPaymentRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepo for InMemoryPaymentRepo {
    async fn insert(&self, payment: NewPayment) -> AppResult<Payment> {
        let created = Payment {
            id: Uuid::new_v4(),
            user_id: payment.user_id,
            subscription_id: None,
            amount: payment.amount,
            plan_type: payment.plan_type,
            payment_method: payment.payment_method,
            payment_reference: payment.payment_reference,
            gateway_reference: None,
            status: PaymentStatus::Pending,
            paid_at: None,
            created_at: now(),
        };
        self.payments.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn find_by_reference(&self, reference: &str) -> AppResult<Option<Payment>> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.payment_reference == reference)
            .cloned())
    }

    async fn mark_success(
        &self,
        payment_id: Uuid,
        paid_at: NaiveDateTime,
        gateway_reference: Option<&str>,
    ) -> AppResult<()> {
        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or(AppError::NotFound("Payment"))?;
        payment.status = PaymentStatus::Success;
        payment.paid_at = Some(paid_at);
        payment.gateway_reference = gateway_reference.map(|s| s.to_string());
        Ok(())
    }

    async fn link_subscription(&self, payment_id: Uuid, subscription_id: Uuid) -> AppResult<()> {
        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or(AppError::NotFound("Payment"))?;
        payment.subscription_id = Some(subscription_id);
        Ok(())
    }
}

// ============================================================================
// InMemoryExamResultRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryExamResultRepo {
    pub results: Mutex<Vec<ExamResult>>,
}

impl InMemoryExamResultRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, result: ExamResult) {
        self.results.lock().unwrap().push(result);
    }
}

#[async_trait]
impl ExamResultRepo for InMemoryExamResultRepo {
    async fn history(
        &self,
        user_id: Uuid,
        mode: Option<ExamMode>,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<ExamResult>, i64)> {
        let results = self.results.lock().unwrap();
        let mut matching: Vec<ExamResult> = results
            .iter()
            .filter(|r| r.user_id == user_id && mode.is_none_or(|m| r.mode == m))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let offset = ((page - 1) * limit) as usize;
        let pageful = matching
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();
        Ok((pageful, total))
    }

    async fn find_for_user(&self, exam_id: Uuid, user_id: Uuid) -> AppResult<Option<ExamResult>> {
        Ok(self
            .results
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == exam_id && r.user_id == user_id)
            .cloned())
    }

    async fn counts(&self, user_id: Uuid) -> AppResult<ExamCounts> {
        let results = self.results.lock().unwrap();
        let mut counts = ExamCounts::default();
        for result in results.iter().filter(|r| r.user_id == user_id) {
            counts.total += 1;
            if result.is_passed {
                counts.passed += 1;
            } else {
                counts.failed += 1;
            }
        }
        Ok(counts)
    }

    async fn passed_scores(&self, user_id: Uuid) -> AppResult<Vec<(i32, i32)>> {
        Ok(self
            .results
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id && r.is_passed)
            .map(|r| (r.score, r.total_obtainable))
            .collect())
    }
}

// ============================================================================
// PermissiveRateLimiter
// ============================================================================

/// Rate limiter that never blocks, for route-level tests.
#[derive(Default)]
pub struct PermissiveRateLimiter;

#[async_trait]
impl crate::infra::rate_limit::RateLimiterTrait for PermissiveRateLimiter {
    async fn check(&self, _ip: &str) -> AppResult<()> {
        Ok(())
    }
}

// ============================================================================
// RecordingEmailSender
// ============================================================================

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
}

/// Captures outbound mail instead of sending it.
#[derive(Default)]
pub struct RecordingEmailSender {
    pub sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_subject(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|e| e.subject.clone())
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
        });
        Ok(())
    }
}
