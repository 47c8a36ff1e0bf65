use std::sync::Arc;
use std::time::Duration;

use crate::audit::{AuditSink, AuditWorker, TracingAuditSink};
use crate::core::config::SmsAdapter;
use crate::core::event_router::{EventChannels, EventRouter};
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result, ServerError};
use crate::notify::{
    LogSender, MessageTemplates, NotificationHook, NotificationSender, NotificationStore,
    NotifyPolicy, ReminderScheduler, TwilioSender,
};
use crate::waitlist::{FixedTurnTime, PropagationGateway, QueueError, QueueManager};

/// Capacity of the critical audit channel
const AUDIT_CHANNEL_BUFFER: usize = 1024;
/// Capacity of the best-effort notify and gateway channels
const OTHER_CHANNEL_BUFFER: usize = 256;

/// Shared server state
///
/// Cheap to clone; every component sits behind an `Arc`.
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub manager: Arc<QueueManager>,
    pub gateway: Arc<PropagationGateway>,
    pub hook: Arc<NotificationHook>,
    pub reminders: Arc<ReminderScheduler>,
    pub audit_sink: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("location_id", &self.config.location_id)
            .field("manager", &self.manager)
            .field("gateway", &self.gateway)
            .field("hook", &self.hook)
            .finish()
    }
}

impl ServerState {
    /// Wire components around an existing manager
    pub fn new(
        config: Config,
        manager: Arc<QueueManager>,
        sender: Arc<dyn NotificationSender>,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let gateway = Arc::new(PropagationGateway::new(
            Arc::clone(&manager),
            config.gateway_poll_interval(),
            config.gateway_max_staleness(),
        )?);
        let notifications = NotificationStore::open(manager.store()).map_err(QueueError::from)?;
        let hook = Arc::new(NotificationHook::new(
            Arc::clone(&manager),
            notifications,
            sender,
            MessageTemplates::new(config.restaurant_name.clone()),
            NotifyPolicy::new(config.notify_on_status.iter().copied()),
        ));
        let reminders = Arc::new(ReminderScheduler::new(
            Arc::clone(&manager),
            Arc::clone(&hook),
            config.reminder_minutes_before,
            config.reminder_check_interval(),
        ));

        Ok(Self {
            config,
            manager,
            gateway,
            hook,
            reminders,
            audit_sink,
        })
    }

    /// Open the store under `work_dir` and build the full state
    pub fn initialize(config: &Config) -> Result<Self> {
        let db_path = config.db_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let turn_time = Arc::new(FixedTurnTime(Some(config.average_turn_minutes)));
        let manager = Arc::new(QueueManager::open(
            &db_path,
            turn_time,
            config.event_channel_capacity,
        )?);
        // Fail at startup rather than on the first request
        manager.turn_minutes()?;

        let sender = Self::build_sender(config)?;
        tracing::info!(
            db = %db_path.display(),
            location_id = %config.location_id,
            sms_adapter = sender.name(),
            "Server state initialized"
        );

        Self::new(
            config.clone(),
            manager,
            sender,
            Arc::new(TracingAuditSink),
        )
    }

    fn build_sender(config: &Config) -> Result<Arc<dyn NotificationSender>> {
        match config.sms_adapter {
            SmsAdapter::Log => Ok(Arc::new(LogSender)),
            SmsAdapter::Twilio => {
                let credentials = config.twilio.clone().ok_or_else(|| {
                    ServerError::Config(
                        "SMS_ADAPTER=twilio requires TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_FROM_NUMBER"
                            .into(),
                    )
                })?;
                Ok(Arc::new(TwilioSender::new(credentials)))
            }
        }
    }

    /// Spawn the router and every consumer loop
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();
        let (router, channels) = EventRouter::new(AUDIT_CHANNEL_BUFFER, OTHER_CHANNEL_BUFFER);
        let EventChannels {
            audit_rx,
            notify_rx,
            gateway_rx,
        } = channels;
        let source = self.manager.subscribe();

        let token = tasks.shutdown_token();
        tasks.spawn("event_router", TaskKind::Worker, async move {
            tokio::select! {
                _ = router.run(source) => {}
                _ = token.cancelled() => {}
            }
        });

        let token = tasks.shutdown_token();
        let audit = AuditWorker::new(Arc::clone(&self.audit_sink));
        tasks.spawn("audit_worker", TaskKind::Worker, async move {
            tokio::select! {
                _ = audit.run(audit_rx) => {}
                _ = token.cancelled() => {}
            }
        });

        tasks.spawn(
            "propagation_gateway",
            TaskKind::Listener,
            Arc::clone(&self.gateway).run(gateway_rx, tasks.shutdown_token()),
        );
        tasks.spawn(
            "notification_hook",
            TaskKind::Listener,
            Arc::clone(&self.hook).run(notify_rx, tasks.shutdown_token()),
        );
        tasks.spawn(
            "reminder_scheduler",
            TaskKind::Periodic,
            Arc::clone(&self.reminders).run(tasks.shutdown_token()),
        );

        tasks.log_summary();
        tasks
    }

    /// Grace period for background tasks at shutdown
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(5)
    }
}
