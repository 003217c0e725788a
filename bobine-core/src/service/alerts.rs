//! Periodic alert rule evaluation.
//!
//! Every interval the evaluator fetches enabled rules and the latest metric
//! sample, skips rules inside their cooldown, and fires the rest through
//! their notification channel. One failing rule never blocks the others;
//! every delivery attempt is written to the alert log.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use super::{LoopHandle, NotificationSender};
use crate::models::{AlertCondition, AlertLogEntry, AlertRule, MetricSample};
use crate::repository::{AlertRepository, ChannelRepository, MetricsRepository, SessionRepository};

const RATE_WINDOW: Duration = Duration::from_secs(3600);

pub struct AlertEvaluator {
    alert_repo: Arc<dyn AlertRepository>,
    channel_repo: Arc<dyn ChannelRepository>,
    metrics_repo: Arc<dyn MetricsRepository>,
    session_repo: Arc<dyn SessionRepository>,
    sender: Arc<dyn NotificationSender>,
    interval: Duration,
}

impl AlertEvaluator {
    pub fn new(
        alert_repo: Arc<dyn AlertRepository>,
        channel_repo: Arc<dyn ChannelRepository>,
        metrics_repo: Arc<dyn MetricsRepository>,
        session_repo: Arc<dyn SessionRepository>,
        sender: Arc<dyn NotificationSender>,
        interval: Duration,
    ) -> Self {
        Self {
            alert_repo,
            channel_repo,
            metrics_repo,
            session_repo,
            sender,
            interval,
        }
    }

    /// Spawn the evaluation loop.
    pub fn start(self: Arc<Self>) -> LoopHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.evaluate_once(Utc::now()).await {
                            warn!("alert evaluation pass failed: {}", e);
                        }
                    }
                    _ = stop_rx.changed() => {
                        debug!("alert evaluator stopping");
                        return;
                    }
                }
            }
        });
        LoopHandle::new(stop_tx, handle)
    }

    /// Run one evaluation pass at `now`. Public for tests.
    pub async fn evaluate_once(&self, now: DateTime<Utc>) -> crate::Result<()> {
        let rules = self.alert_repo.list_enabled_rules().await?;
        if rules.is_empty() {
            return Ok(());
        }

        let latest = self.metrics_repo.latest().await?;

        for rule in &rules {
            if rule.in_cooldown(now) {
                continue;
            }
            if let Err(e) = self.evaluate_rule(rule, latest.as_ref(), now).await {
                error!(rule = %rule.name, "rule evaluation failed: {}", e);
            }
        }
        Ok(())
    }

    async fn evaluate_rule(
        &self,
        rule: &AlertRule,
        sample: Option<&MetricSample>,
        now: DateTime<Utc>,
    ) -> crate::Result<()> {
        let Some(message) = self.condition_message(rule, sample).await? else {
            return Ok(());
        };

        let channel = self
            .channel_repo
            .get_channel(&rule.channel_id)
            .await?
            .ok_or_else(|| {
                crate::Error::NotFound(format!("channel {} for rule {}", rule.channel_id, rule.name))
            })?;

        let send_result = self.sender.send(&channel, &rule.name, &message).await;
        let success = send_result.is_ok();
        if let Err(ref e) = send_result {
            error!(rule = %rule.name, channel = %channel.name, "alert delivery failed: {}", e);
        }

        self.alert_repo
            .log_alert(&AlertLogEntry {
                rule_id: rule.id.clone(),
                channel_id: channel.id.clone(),
                message: message.clone(),
                sent_at: now,
                success,
                error: send_result.err().map(|e| e.to_string()),
            })
            .await?;

        // A failed delivery still consumes the cooldown; a broken webhook
        // must not be retried every pass.
        self.alert_repo.update_last_triggered(&rule.id, now).await?;

        Ok(())
    }

    /// Evaluate the rule's condition; `Some(message)` means it fired.
    async fn condition_message(
        &self,
        rule: &AlertRule,
        sample: Option<&MetricSample>,
    ) -> crate::Result<Option<String>> {
        let message = match rule.condition {
            AlertCondition::DiskLow => sample.and_then(|s| {
                (s.disk_free_gb < rule.threshold).then(|| {
                    format!(
                        "Disk space is low: {:.1} GB free (threshold: {:.1} GB)",
                        s.disk_free_gb, rule.threshold
                    )
                })
            }),
            AlertCondition::GpuTempHigh => sample.and_then(|s| {
                s.gpu_temp_c
                    .filter(|t| *t > rule.threshold)
                    .map(|t| {
                        format!(
                            "GPU temperature is high: {t:.0}\u{b0}C (threshold: {:.0}\u{b0}C)",
                            rule.threshold
                        )
                    })
            }),
            AlertCondition::TranscodeFailureRate => {
                let failures = self
                    .session_repo
                    .count_recent_transcode_failures(RATE_WINDOW)
                    .await?;
                (failures as f64 > rule.threshold).then(|| {
                    format!(
                        "{failures} transcode failures in the last hour (threshold: {})",
                        rule.threshold
                    )
                })
            }
            AlertCondition::StreamErrorRate => {
                let errors = self
                    .session_repo
                    .count_recent_stream_errors(RATE_WINDOW)
                    .await?;
                (errors as f64 > rule.threshold).then(|| {
                    format!(
                        "{errors} stream errors in the last hour (threshold: {})",
                        rule.threshold
                    )
                })
            }
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelId, ChannelKind, NotificationChannel, RuleId};
    use crate::repository::{
        MockAlertRepository, MockChannelRepository, MockMetricsRepository, MockSessionRepository,
    };
    use crate::service::notify::MockNotificationSender;
    use chrono::TimeZone;
    use mockall::predicate::always;

    fn disk_rule(last_triggered: Option<DateTime<Utc>>) -> AlertRule {
        AlertRule {
            id: RuleId::from("rule-disk-low"),
            name: "disk-low".to_string(),
            condition: AlertCondition::DiskLow,
            threshold: 10.0,
            cooldown_minutes: 30,
            last_triggered,
            channel_id: ChannelId::from("chan-ops"),
            enabled: true,
        }
    }

    fn webhook_channel() -> NotificationChannel {
        NotificationChannel {
            id: ChannelId::from("chan-ops"),
            name: "ops".to_string(),
            kind: ChannelKind::Webhook {
                url: "http://127.0.0.1:1/hook".to_string(),
            },
            enabled: true,
        }
    }

    fn low_disk_sample() -> MetricSample {
        let mut sample = MetricSample::empty(Utc::now());
        sample.disk_free_gb = 5.2;
        sample
    }

    fn evaluator(
        alert_repo: MockAlertRepository,
        channel_repo: MockChannelRepository,
        metrics_repo: MockMetricsRepository,
        session_repo: MockSessionRepository,
        sender: MockNotificationSender,
    ) -> AlertEvaluator {
        AlertEvaluator::new(
            Arc::new(alert_repo),
            Arc::new(channel_repo),
            Arc::new(metrics_repo),
            Arc::new(session_repo),
            Arc::new(sender),
            Duration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn disk_low_fires_once_with_exact_message() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let mut alerts = MockAlertRepository::new();
        alerts
            .expect_list_enabled_rules()
            .returning(|| Ok(vec![disk_rule(None)]));
        alerts
            .expect_log_alert()
            .withf(|entry| entry.success && entry.error.is_none())
            .times(1)
            .returning(|_| Ok(()));
        alerts
            .expect_update_last_triggered()
            .with(always(), mockall::predicate::eq(now))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut channels = MockChannelRepository::new();
        channels
            .expect_get_channel()
            .returning(|_| Ok(Some(webhook_channel())));

        let mut metrics = MockMetricsRepository::new();
        metrics
            .expect_latest()
            .returning(|| Ok(Some(low_disk_sample())));

        let mut sender = MockNotificationSender::new();
        sender
            .expect_send()
            .withf(|_, _, body| {
                body == "Disk space is low: 5.2 GB free (threshold: 10.0 GB)"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let eval = evaluator(
            alerts,
            channels,
            metrics,
            MockSessionRepository::new(),
            sender,
        );
        eval.evaluate_once(now).await.unwrap_or_else(|e| panic!("{e}"));
    }

    #[tokio::test]
    async fn cooldown_suppresses_second_firing() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let fired_10_min_ago = Some(now - chrono::Duration::minutes(10));

        let mut alerts = MockAlertRepository::new();
        alerts
            .expect_list_enabled_rules()
            .returning(move || Ok(vec![disk_rule(fired_10_min_ago)]));

        let mut metrics = MockMetricsRepository::new();
        metrics
            .expect_latest()
            .returning(|| Ok(Some(low_disk_sample())));

        let mut sender = MockNotificationSender::new();
        sender.expect_send().times(0);

        let eval = evaluator(
            alerts,
            MockChannelRepository::new(),
            metrics,
            MockSessionRepository::new(),
            sender,
        );
        eval.evaluate_once(now).await.unwrap_or_else(|e| panic!("{e}"));
    }

    #[tokio::test]
    async fn failed_delivery_is_logged_and_consumes_cooldown() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let mut alerts = MockAlertRepository::new();
        alerts
            .expect_list_enabled_rules()
            .returning(|| Ok(vec![disk_rule(None)]));
        alerts
            .expect_log_alert()
            .withf(|entry| !entry.success && entry.error.is_some())
            .times(1)
            .returning(|_| Ok(()));
        alerts
            .expect_update_last_triggered()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut channels = MockChannelRepository::new();
        channels
            .expect_get_channel()
            .returning(|_| Ok(Some(webhook_channel())));

        let mut metrics = MockMetricsRepository::new();
        metrics
            .expect_latest()
            .returning(|| Ok(Some(low_disk_sample())));

        let mut sender = MockNotificationSender::new();
        sender.expect_send().returning(|_, _, _| {
            Err(crate::Error::NotificationDelivery("connection refused".to_string()))
        });

        let eval = evaluator(
            alerts,
            channels,
            metrics,
            MockSessionRepository::new(),
            sender,
        );
        eval.evaluate_once(now).await.unwrap_or_else(|e| panic!("{e}"));
    }

    #[tokio::test]
    async fn rate_condition_queries_session_repository() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let rule = AlertRule {
            condition: AlertCondition::TranscodeFailureRate,
            threshold: 3.0,
            name: "transcode-failures".to_string(),
            ..disk_rule(None)
        };

        let mut alerts = MockAlertRepository::new();
        let rule_clone = rule.clone();
        alerts
            .expect_list_enabled_rules()
            .returning(move || Ok(vec![rule_clone.clone()]));
        alerts.expect_log_alert().times(1).returning(|_| Ok(()));
        alerts
            .expect_update_last_triggered()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut channels = MockChannelRepository::new();
        channels
            .expect_get_channel()
            .returning(|_| Ok(Some(webhook_channel())));

        let mut metrics = MockMetricsRepository::new();
        metrics.expect_latest().returning(|| Ok(None));

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_count_recent_transcode_failures()
            .returning(|_| Ok(7));

        let mut sender = MockNotificationSender::new();
        sender
            .expect_send()
            .withf(|_, _, body| body.starts_with("7 transcode failures"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let eval = evaluator(alerts, channels, metrics, sessions, sender);
        eval.evaluate_once(now).await.unwrap_or_else(|e| panic!("{e}"));
    }
}
