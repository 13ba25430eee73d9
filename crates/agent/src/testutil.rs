//! Shared in-memory fakes for agent tests. Call recording is what the
//! interesting assertions hang off: "no award call was made", "the model
//! was never consulted".

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use joey_core::api::{
    AdminProfile, AwardReceipt, Balance, BookingReceipt, CancellationReceipt, ChatApi,
    CoworkingDay, LedgerEntry, PointsApi, RedemptionRequest, RewardItem, TaskSummary,
    UserProfile,
};
use joey_core::{AdminAllowance, ApiError, RateCardEntry};

use crate::llm::{ChatMessage, ChatOutcome, LlmClient};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AwardCall {
    pub admin_id: String,
    pub target_id: String,
    pub points: i64,
    pub reason: String,
}

pub struct StubPoints {
    pub balance: Balance,
    pub tasks: Vec<TaskSummary>,
    pub rewards: Vec<RewardItem>,
    pub rate_card: Vec<RateCardEntry>,
    pub admin_ids: Vec<String>,
    /// `None` renders as the backend's 404 for non-admins.
    pub allowance: Option<AdminAllowance>,
    pub booking_cost: i64,
    pub refund_amount: i64,
    pub fail_upstream: bool,
    pub award_calls: Mutex<Vec<AwardCall>>,
    pub system_award_calls: Mutex<Vec<AwardCall>>,
    pub booking_calls: Mutex<Vec<(String, String)>>,
    pub cancel_calls: Mutex<Vec<(String, String)>>,
    pub recorded_posts: Mutex<HashSet<(String, String)>>,
    pub linked_users: Mutex<HashSet<String>>,
    pub link_calls: Mutex<Vec<(String, String)>>,
}

impl Default for StubPoints {
    fn default() -> Self {
        Self {
            balance: Balance { balance: 42, lifetime_earned: 100, lifetime_spent: 58 },
            tasks: Vec::new(),
            rewards: Vec::new(),
            rate_card: Vec::new(),
            admin_ids: Vec::new(),
            allowance: None,
            booking_cost: 1,
            refund_amount: 1,
            fail_upstream: false,
            award_calls: Mutex::new(Vec::new()),
            system_award_calls: Mutex::new(Vec::new()),
            booking_calls: Mutex::new(Vec::new()),
            cancel_calls: Mutex::new(Vec::new()),
            recorded_posts: Mutex::new(HashSet::new()),
            linked_users: Mutex::new(HashSet::new()),
            link_calls: Mutex::new(Vec::new()),
        }
    }
}

impl StubPoints {
    fn gate(&self) -> Result<(), ApiError> {
        if self.fail_upstream {
            Err(ApiError::Upstream("stub outage".to_owned()))
        } else {
            Ok(())
        }
    }

    pub fn award_call_count(&self) -> usize {
        self.award_calls.lock().expect("award calls").len()
    }

    pub fn system_award_call_count(&self) -> usize {
        self.system_award_calls.lock().expect("system award calls").len()
    }
}

#[async_trait]
impl PointsApi for StubPoints {
    async fn get_balance(&self, _user_id: &str) -> Result<Balance, ApiError> {
        self.gate()?;
        Ok(self.balance.clone())
    }

    async fn get_history(
        &self,
        _user_id: &str,
        _limit: usize,
    ) -> Result<Vec<LedgerEntry>, ApiError> {
        self.gate()?;
        Ok(Vec::new())
    }

    async fn list_tasks(&self, _status: Option<&str>) -> Result<Vec<TaskSummary>, ApiError> {
        self.gate()?;
        Ok(self.tasks.clone())
    }

    async fn claim_task(&self, task_id: i64, _user_id: &str) -> Result<TaskSummary, ApiError> {
        self.gate()?;
        self.tasks.iter().find(|task| task.id == task_id).cloned().ok_or(ApiError::NotFound)
    }

    async fn submit_task(
        &self,
        task_id: i64,
        _user_id: &str,
        _submission_text: &str,
    ) -> Result<TaskSummary, ApiError> {
        self.gate()?;
        self.tasks.iter().find(|task| task.id == task_id).cloned().ok_or(ApiError::NotFound)
    }

    async fn create_task(
        &self,
        _admin_id: &str,
        title: &str,
        points: i64,
        _description: &str,
        _assignee: Option<&str>,
    ) -> Result<TaskSummary, ApiError> {
        self.gate()?;
        Ok(TaskSummary {
            id: 99,
            title: title.to_owned(),
            points,
            portfolio: "events".to_owned(),
            status: "open".to_owned(),
        })
    }

    async fn approve_task(&self, task_id: i64, _admin_id: &str) -> Result<TaskSummary, ApiError> {
        self.gate()?;
        self.tasks.iter().find(|task| task.id == task_id).cloned().ok_or(ApiError::NotFound)
    }

    async fn reject_task(
        &self,
        task_id: i64,
        _admin_id: &str,
        _reason: &str,
    ) -> Result<TaskSummary, ApiError> {
        self.gate()?;
        self.tasks.iter().find(|task| task.id == task_id).cloned().ok_or(ApiError::NotFound)
    }

    async fn award_task(
        &self,
        task_id: i64,
        _admin_id: &str,
        _target_id: &str,
    ) -> Result<TaskSummary, ApiError> {
        self.gate()?;
        self.tasks.iter().find(|task| task.id == task_id).cloned().ok_or(ApiError::NotFound)
    }

    async fn award_points(
        &self,
        admin_id: &str,
        target_id: &str,
        points: i64,
        reason: &str,
    ) -> Result<AwardReceipt, ApiError> {
        self.gate()?;
        self.award_calls.lock().expect("award calls").push(AwardCall {
            admin_id: admin_id.to_owned(),
            target_id: target_id.to_owned(),
            points,
            reason: reason.to_owned(),
        });
        Ok(AwardReceipt { new_balance: Some(100) })
    }

    async fn system_award_points(
        &self,
        acting_id: &str,
        target_id: &str,
        points: i64,
        reason: &str,
    ) -> Result<AwardReceipt, ApiError> {
        self.gate()?;
        self.system_award_calls.lock().expect("system award calls").push(AwardCall {
            admin_id: acting_id.to_owned(),
            target_id: target_id.to_owned(),
            points,
            reason: reason.to_owned(),
        });
        Ok(AwardReceipt::default())
    }

    async fn check_coworking(&self, _days: u32) -> Result<Vec<CoworkingDay>, ApiError> {
        self.gate()?;
        Ok(Vec::new())
    }

    async fn book_coworking(
        &self,
        user_id: &str,
        date: &str,
        _channel_id: Option<&str>,
    ) -> Result<BookingReceipt, ApiError> {
        self.gate()?;
        self.booking_calls
            .lock()
            .expect("booking calls")
            .push((user_id.to_owned(), date.to_owned()));
        Ok(BookingReceipt { points_cost: self.booking_cost })
    }

    async fn cancel_coworking(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<CancellationReceipt, ApiError> {
        self.gate()?;
        self.cancel_calls
            .lock()
            .expect("cancel calls")
            .push((user_id.to_owned(), date.to_owned()));
        Ok(CancellationReceipt { refund_amount: self.refund_amount })
    }

    async fn list_rewards(&self, _user_id: Option<&str>) -> Result<Vec<RewardItem>, ApiError> {
        self.gate()?;
        Ok(self.rewards.clone())
    }

    async fn request_reward(
        &self,
        _user_id: &str,
        _reward_code: &str,
        _quantity: u32,
    ) -> Result<(), ApiError> {
        self.gate()
    }

    async fn pending_redemptions(
        &self,
        _admin_id: &str,
    ) -> Result<Vec<RedemptionRequest>, ApiError> {
        self.gate()?;
        Ok(Vec::new())
    }

    async fn approve_reward(&self, _admin_id: &str, _redemption_id: &str) -> Result<(), ApiError> {
        self.gate()
    }

    async fn get_rate_card(&self) -> Result<Vec<RateCardEntry>, ApiError> {
        self.gate()?;
        Ok(self.rate_card.clone())
    }

    async fn get_admin(&self, user_id: &str) -> Result<Option<AdminProfile>, ApiError> {
        self.gate()?;
        Ok(self
            .admin_ids
            .iter()
            .any(|id| id == user_id)
            .then(|| AdminProfile { slack_id: user_id.to_owned(), name: None }))
    }

    async fn get_admin_allowance(&self, _user_id: &str) -> Result<AdminAllowance, ApiError> {
        self.gate()?;
        self.allowance.ok_or(ApiError::NotFound)
    }

    async fn has_posted_in_channel(
        &self,
        user_id: &str,
        channel_id: &str,
    ) -> Result<bool, ApiError> {
        self.gate()?;
        Ok(self
            .recorded_posts
            .lock()
            .expect("recorded posts")
            .contains(&(user_id.to_owned(), channel_id.to_owned())))
    }

    async fn record_channel_post(&self, user_id: &str, channel_id: &str) -> Result<(), ApiError> {
        self.gate()?;
        self.recorded_posts
            .lock()
            .expect("recorded posts")
            .insert((user_id.to_owned(), channel_id.to_owned()));
        Ok(())
    }

    async fn get_user_by_slack_id(&self, slack_id: &str) -> Result<Option<i64>, ApiError> {
        self.gate()?;
        Ok(self.linked_users.lock().expect("linked users").contains(slack_id).then_some(42))
    }

    async fn link_slack_user(
        &self,
        slack_id: &str,
        email: &str,
    ) -> Result<Option<i64>, ApiError> {
        self.gate()?;
        self.link_calls
            .lock()
            .expect("link calls")
            .push((slack_id.to_owned(), email.to_owned()));
        self.linked_users.lock().expect("linked users").insert(slack_id.to_owned());
        Ok(Some(42))
    }
}

pub struct StubChat {
    pub posts: Mutex<Vec<(String, String)>>,
    pub dms: Mutex<Vec<(String, String)>>,
    pub user_email: Option<String>,
}

impl Default for StubChat {
    fn default() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            dms: Mutex::new(Vec::new()),
            user_email: Some("member@example.test".to_owned()),
        }
    }
}

#[async_trait]
impl ChatApi for StubChat {
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        _thread_id: Option<&str>,
    ) -> Result<(), ApiError> {
        self.posts.lock().expect("posts").push((channel_id.to_owned(), text.to_owned()));
        Ok(())
    }

    async fn send_dm(&self, user_id: &str, text: &str) -> Result<(), ApiError> {
        self.dms.lock().expect("dms").push((user_id.to_owned(), text.to_owned()));
        Ok(())
    }

    async fn bot_user_id(&self) -> Result<String, ApiError> {
        Ok("BOT1".to_owned())
    }

    async fn lookup_user(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        Ok(UserProfile { display_name: user_id.to_owned(), email: self.user_email.clone() })
    }

    async fn channel_name(&self, _channel_id: &str) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

/// Counts chat calls; panics are left to the caller's assertions rather
/// than the fake, so a surprise call shows up as a failed count.
pub struct CountingLlm {
    pub reply: String,
    calls: AtomicUsize,
}

impl CountingLlm {
    pub fn new(reply: &str) -> Self {
        Self { reply: reply.to_owned(), calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for CountingLlm {
    async fn chat(&self, _messages: &[ChatMessage]) -> Result<ChatOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChatOutcome { content: self.reply.clone(), model: "fake".to_owned(), usage: None })
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("not supported")
    }
}
