use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use joey_core::api::{ChatApi, GenerationRequest, JobApi, JobStatusReport};
use joey_core::skill::Skill;
use joey_core::{ActionRequest, ActionResult};

use crate::executor::SkillHandler;
use crate::monitor::{outcome_message, JobMonitor, MonitorSettings, ProgressSink};

/// Native handler for the content-factory skill: starts a generation job
/// and spawns a detached monitor that posts progress into the thread the
/// request came from.
pub struct ContentFactoryHandler {
    jobs: Arc<dyn JobApi>,
    chat: Arc<dyn ChatApi>,
    settings: MonitorSettings,
}

impl ContentFactoryHandler {
    pub fn new(jobs: Arc<dyn JobApi>, chat: Arc<dyn ChatApi>, settings: MonitorSettings) -> Self {
        Self { jobs, chat, settings }
    }
}

#[async_trait]
impl SkillHandler for ContentFactoryHandler {
    async fn execute(&self, skill: &Skill, request: &ActionRequest) -> Option<ActionResult> {
        let Some(topic) = request.param_str("topic").map(str::to_owned) else {
            return Some(ActionResult::clarify(
                "What should the article be about? Give me a topic and I'll get cracking.",
            ));
        };
        let target_keyword =
            request.param_str("target_keyword").unwrap_or(&topic).to_owned();
        let domain = request
            .param_str("domain")
            .map(str::to_owned)
            .or_else(|| declared_default(skill, "domain"))
            .unwrap_or_default();

        let generation = GenerationRequest {
            domain,
            topic: topic.clone(),
            target_keyword,
            context: None,
        };

        let job_id = match self.jobs.start_generation(&generation).await {
            Ok(job_id) => job_id,
            Err(error) => {
                warn!(event_name = "content.start_failed", %error, "generation start failed");
                return Some(ActionResult::failed(error.kind(), error.user_message()));
            }
        };
        info!(event_name = "content.job_started", %job_id, topic = %topic, "generation job started");

        self.spawn_monitor(job_id, topic.clone(), request);

        Some(ActionResult::ok(format!(
            "On it! 📝 Generating an article on *{topic}*. This takes a few minutes, \
             I'll post updates here as it goes."
        )))
    }
}

impl ContentFactoryHandler {
    /// Fire-and-forget: the monitor outlives this request and reports
    /// back purely through outbound chat calls.
    fn spawn_monitor(&self, job_id: String, topic: String, request: &ActionRequest) {
        let monitor = JobMonitor::new(Arc::clone(&self.jobs), self.settings);
        let sink = ThreadProgressSink {
            chat: Arc::clone(&self.chat),
            user_id: request.requester_id.clone(),
            channel_id: request.channel_id.clone(),
            thread_id: request.thread_id.clone(),
        };

        tokio::spawn(async move {
            let outcome = monitor.run(&job_id, &sink).await;
            sink.post(&outcome_message(&topic, &outcome)).await;
        });
    }
}

struct ThreadProgressSink {
    chat: Arc<dyn ChatApi>,
    user_id: String,
    channel_id: Option<String>,
    thread_id: Option<String>,
}

impl ThreadProgressSink {
    /// Posts into the originating thread, or DMs the requester when the
    /// request came in without a channel. Chat failures are logged and
    /// swallowed; a progress note is never worth failing a monitor over.
    async fn post(&self, text: &str) {
        let result = match &self.channel_id {
            Some(channel_id) => {
                self.chat.post_message(channel_id, text, self.thread_id.as_deref()).await
            }
            None => self.chat.send_dm(&self.user_id, text).await,
        };
        if let Err(error) = result {
            warn!(event_name = "content.progress_post_failed", %error, "progress update failed");
        }
    }
}

#[async_trait]
impl ProgressSink for ThreadProgressSink {
    async fn notify(&self, report: &JobStatusReport) {
        self.post(&format!("⏳ {} ({}%)", report.current_step, report.progress)).await;
    }
}

fn declared_default(skill: &Skill, name: &str) -> Option<String> {
    skill
        .parameters
        .iter()
        .find(|param| param.name == name)
        .and_then(|param| param.default.clone())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use joey_core::api::{
        GenerationRequest, JobApi, JobStatus, JobStatusReport, PublishReceipt,
    };
    use joey_core::skill::builtin_skills;
    use joey_core::{ActionRequest, ApiError};

    use super::ContentFactoryHandler;
    use crate::executor::SkillHandler;
    use crate::monitor::MonitorSettings;
    use crate::testutil::StubChat;

    struct ScriptedJobs {
        started: Mutex<Vec<GenerationRequest>>,
        reports: Mutex<VecDeque<JobStatusReport>>,
    }

    #[async_trait]
    impl JobApi for ScriptedJobs {
        async fn start_generation(&self, request: &GenerationRequest) -> Result<String, ApiError> {
            self.started.lock().expect("started").push(request.clone());
            Ok("job-7".to_owned())
        }

        async fn status(&self, _job_id: &str) -> Result<JobStatusReport, ApiError> {
            Ok(self.reports.lock().expect("reports").pop_front().unwrap_or(JobStatusReport {
                job_id: "job-7".to_owned(),
                status: JobStatus::Completed,
                progress: 100,
                current_step: "publish".to_owned(),
                error: None,
            }))
        }

        async fn result(&self, _job_id: &str) -> Result<Value, ApiError> {
            Ok(Value::Null)
        }

        async fn publish(&self, _job_id: &str) -> Result<PublishReceipt, ApiError> {
            Ok(PublishReceipt {
                preview_url: Some("https://preview.example/article".to_owned()),
                pr_url: None,
            })
        }
    }

    fn content_request(topic: Option<&str>) -> ActionRequest {
        let mut request = ActionRequest::new("content-factory", "U1");
        request.raw_text = "write an article".to_owned();
        request.channel_id = Some("C1".to_owned());
        request.thread_id = Some("171.001".to_owned());
        if let Some(topic) = topic {
            request.params.insert("topic".into(), json!(topic));
        }
        request
    }

    #[tokio::test]
    async fn missing_topic_asks_instead_of_starting_a_job() {
        let jobs = Arc::new(ScriptedJobs {
            started: Mutex::new(Vec::new()),
            reports: Mutex::new(VecDeque::new()),
        });
        let handler = ContentFactoryHandler::new(
            Arc::clone(&jobs) as _,
            Arc::new(StubChat::default()),
            MonitorSettings::default(),
        );
        let skill =
            builtin_skills().into_iter().find(|s| s.name == "content-factory").expect("skill");

        let result =
            handler.execute(&skill, &content_request(None)).await.expect("handled");
        assert!(result.is_clarification());
        assert!(jobs.started.lock().expect("started").is_empty());
    }

    #[tokio::test]
    async fn started_job_reports_back_into_the_thread() {
        let jobs = Arc::new(ScriptedJobs {
            started: Mutex::new(Vec::new()),
            reports: Mutex::new(VecDeque::new()),
        });
        let chat = Arc::new(StubChat::default());
        let handler = ContentFactoryHandler::new(
            Arc::clone(&jobs) as _,
            Arc::clone(&chat) as _,
            MonitorSettings {
                poll_interval: Duration::from_millis(1),
                ..MonitorSettings::default()
            },
        );
        let skill =
            builtin_skills().into_iter().find(|s| s.name == "content-factory").expect("skill");

        let result = handler
            .execute(&skill, &content_request(Some("AI Hackathons")))
            .await
            .expect("handled");
        assert!(result.success);
        assert!(result.message.contains("AI Hackathons"));

        // The request itself returned immediately; the detached monitor
        // posts the publish outcome shortly after.
        for _ in 0..100 {
            if !chat.posts.lock().expect("posts").is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        let posts = chat.posts.lock().expect("posts").clone();
        assert!(posts.iter().any(|(channel, text)| {
            channel == "C1" && text.contains("https://preview.example/article")
        }));

        let started = jobs.started.lock().expect("started").clone();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].topic, "AI Hackathons");
        // The declared default fills in the domain when unstated.
        assert_eq!(started[0].domain, "mlai.au");
    }
}
