//! Scheduler loop for the dashboard daemon
//!
//! Drives every engine from one thread: 1s wakeups, with per-concern
//! cooldowns deciding what actually runs on a wakeup. Engines already
//! guard their own re-entry, so the loop never tracks in-flight state
//! beyond the last-run timestamps.

use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};

use desk::stats::refresh_stats;
use desk::{
    cooldown_elapsed, CachedMessage, DeskStore, GmailClient, SlaSyncEngine, SyncEngine,
    SyncListener, TickOutcome, WebhookClient,
};

use crate::notify::{NotificationCenter, NotificationKind};
use crate::refresh::{FailureAction, StatsRefreshPolicy};
use crate::settings::DaemonSettings;

/// Delta poll interval
const SYNC_INTERVAL_SECS: u64 = 15;
/// Stats snapshot interval
const STATS_INTERVAL_SECS: u64 = 10;
/// Delay before the one-shot historical import
const IMPORT_DELAY_SECS: i64 = 2;
/// Delay before the one-shot SLA sync
const SLA_DELAY_SECS: i64 = 3;
/// How often the watch channel expiry is checked
const WATCH_CHECK_INTERVAL_SECS: u64 = 3600;

/// Startup options parsed from the command line
#[derive(Debug, Default)]
pub struct DaemonOptions {
    /// Run each engine once and exit instead of looping
    pub once: bool,
    /// Force an SLA re-sync even if one already ran this session
    pub force_sla: bool,
    /// Fire the workflow webhook after the first stats snapshot
    pub trigger_webhook: bool,
}

/// Pushes new-mail notifications as deltas land
struct NotifyListener {
    notifications: Arc<NotificationCenter>,
}

impl SyncListener for NotifyListener {
    fn on_messages_added(&self, messages: &[CachedMessage]) {
        debug!("Delta added {} messages to the cache", messages.len());
    }

    fn on_unread_added(&self, count: usize) {
        let message = if count == 1 {
            "1 new unread email".to_string()
        } else {
            format!("{} new unread emails", count)
        };
        self.notifications
            .push(NotificationKind::NewMail, "New mail", message);
    }
}

/// Owns the engines and runs the scheduler loop
pub struct Daemon {
    gmail: Arc<GmailClient>,
    store: Arc<dyn DeskStore>,
    user_email: String,
    sync: SyncEngine,
    sla: SlaSyncEngine,
    webhook: WebhookClient,
    settings: DaemonSettings,
    notifications: Arc<NotificationCenter>,
    stats_policy: StatsRefreshPolicy,
}

impl Daemon {
    pub fn new(
        gmail: Arc<GmailClient>,
        store: Arc<dyn DeskStore>,
        user_email: String,
        settings: DaemonSettings,
    ) -> Self {
        let notifications = Arc::new(NotificationCenter::new());

        let mut sync = SyncEngine::new(gmail.clone(), store.clone(), user_email.clone());
        sync.add_listener(Arc::new(NotifyListener {
            notifications: notifications.clone(),
        }));

        let sla = SlaSyncEngine::new(gmail.clone(), store.clone(), user_email.clone());
        let webhook = WebhookClient::new(settings.webhook_url.clone());

        Self {
            gmail,
            store,
            user_email,
            sync,
            sla,
            webhook,
            settings,
            notifications,
            stats_policy: StatsRefreshPolicy::new(),
        }
    }

    /// Run the scheduler until the process is killed (or once, with
    /// `options.once`).
    pub fn run(&mut self, options: &DaemonOptions) -> Result<()> {
        info!("Daemon started for {}", self.user_email);

        if options.once {
            return self.run_once(options);
        }

        let started_at = Utc::now();
        let import_due = started_at + chrono::Duration::seconds(IMPORT_DELAY_SECS);
        let sla_due = started_at + chrono::Duration::seconds(SLA_DELAY_SECS);

        let mut last_sync: Option<DateTime<Utc>> = None;
        let mut last_stats: Option<DateTime<Utc>> = None;
        let mut last_watch_check: Option<DateTime<Utc>> = None;
        let mut import_attempted = false;
        let mut sla_started = false;
        let mut webhook_pending = options.trigger_webhook;

        loop {
            let now = Utc::now();

            if cooldown_elapsed(last_sync, now, SYNC_INTERVAL_SECS) {
                last_sync = Some(now);
                self.sync_tick();
            }

            // One-shot delays fire shortly after session start; the import
            // only when the completion flag is still unset.
            if !import_attempted && now >= import_due {
                import_attempted = true;
                self.maybe_run_import();
            }

            if !sla_started && now >= sla_due {
                sla_started = true;
                self.sla_tick(options.force_sla);
            }

            if cooldown_elapsed(last_stats, now, STATS_INTERVAL_SECS) {
                last_stats = Some(now);
                let stats = self.stats_tick();

                if webhook_pending {
                    if let Some(stats) = stats {
                        webhook_pending = false;
                        self.trigger_webhook(&stats);
                    }
                }
            }

            if cooldown_elapsed(last_watch_check, now, WATCH_CHECK_INTERVAL_SECS) {
                last_watch_check = Some(now);
                self.check_watch(now);
            }

            // Reading prunes expired entries; without it the queue would
            // grow for as long as the daemon runs.
            let _ = self.notifications.active(now);

            thread::sleep(StdDuration::from_secs(1));
        }
    }

    /// Single pass over every engine, for `--once` runs and cron-style use.
    fn run_once(&mut self, options: &DaemonOptions) -> Result<()> {
        // First tick seeds the cursor; a second applies any backlog.
        match self.sync.tick() {
            Ok(TickOutcome::Initialized) => self.sync_tick(),
            Ok(_) => {}
            Err(err) => warn!("Sync tick failed: {:#}", err),
        }

        self.maybe_run_import();
        self.sla_tick(options.force_sla);

        let stats = self.stats_tick();
        if options.trigger_webhook {
            let stats = stats.context("Cannot trigger webhook without a stats snapshot")?;
            self.trigger_webhook(&stats);
        }

        Ok(())
    }

    fn sync_tick(&self) {
        match self.sync.tick() {
            Ok(TickOutcome::Initialized) => {
                info!("Sync initialized for {}", self.user_email);
            }
            Ok(TickOutcome::Skipped) => {
                debug!("Sync tick skipped; previous tick still running");
            }
            Ok(TickOutcome::Rebuilt(stats)) => {
                self.notifications.push(
                    NotificationKind::SyncError,
                    "Sync",
                    format!(
                        "History expired; rebuilt label records ({} messages)",
                        stats.messages_fetched
                    ),
                );
            }
            Ok(TickOutcome::Delta(stats)) => {
                if stats.added + stats.modified + stats.deleted > 0 {
                    debug!(
                        "Delta applied in {}ms: {} added, {} modified, {} deleted",
                        stats.duration_ms, stats.added, stats.modified, stats.deleted
                    );
                }
            }
            // Already recorded on the sync status; the next tick retries
            Err(err) => {
                self.notifications.push(
                    NotificationKind::SyncError,
                    "Sync failed",
                    format!("{:#}", err),
                );
            }
        }
    }

    /// Run the historical import when the completion flag is still unset.
    fn maybe_run_import(&self) {
        let needs_import = match self.store.get_sync_status(&self.user_email) {
            Ok(Some(status)) => status.needs_historical_import(),
            Ok(None) => true,
            Err(err) => {
                warn!("Could not read sync status before import: {:#}", err);
                return;
            }
        };
        if !needs_import {
            return;
        }

        match self.sync.run_historical_import() {
            Ok(stats) => {
                info!(
                    "Historical import: {} messages, {} records",
                    stats.messages_fetched, stats.records_saved
                );
            }
            // Flag stays unset; the next session retries the full window
            Err(err) => {
                self.notifications.push(
                    NotificationKind::SyncError,
                    "Historical import failed",
                    format!("{:#}", err),
                );
            }
        }
    }

    fn sla_tick(&self, force: bool) {
        match self.sla.check_labels() {
            Ok(check) if check.available.is_empty() => {
                self.notifications.push(
                    NotificationKind::Config,
                    "SLA tracking",
                    "No SLA labels found; create them in Gmail to enable tracking",
                );
                return;
            }
            Ok(check) if !check.missing.is_empty() => {
                debug!("SLA labels missing: {}", check.missing.join(", "));
            }
            Ok(_) => {}
            Err(err) => {
                warn!("SLA label check failed: {:#}", err);
                return;
            }
        }

        let stats = self.sla.sync(force);
        if stats.synced > 0 || stats.errors > 0 {
            self.notifications.push(
                NotificationKind::Sla,
                "SLA sync",
                format!("{} tracked, {} errors", stats.synced, stats.errors),
            );
        }
    }

    fn stats_tick(&mut self) -> Option<desk::GmailStats> {
        match refresh_stats(&self.gmail, self.store.as_ref(), &self.user_email) {
            Ok(stats) => {
                self.stats_policy.record_success();
                Some(stats)
            }
            Err(err) => {
                if self.stats_policy.record_failure() == FailureAction::Surface {
                    self.notifications.push(
                        NotificationKind::SyncError,
                        "Stats refresh failed",
                        format!("{:#}", err),
                    );
                } else {
                    debug!("Stats refresh failed, retrying silently: {:#}", err);
                }
                None
            }
        }
    }

    fn trigger_webhook(&self, stats: &desk::GmailStats) {
        if !self.webhook.is_configured() {
            self.notifications.push(
                NotificationKind::Config,
                "Workflow",
                "Webhook URL not configured",
            );
            return;
        }

        let token = match self.gmail.access_token() {
            Ok(token) => token,
            Err(err) => {
                warn!("Cannot trigger webhook without an access token: {:#}", err);
                return;
            }
        };

        let fields = self.settings.email_fields();
        match self
            .webhook
            .trigger_workflow(&self.user_email, &token, stats, &fields)
        {
            Ok(true) => {
                self.notifications
                    .push(NotificationKind::Webhook, "Workflow", "Workflow triggered");
            }
            Ok(false) => {
                self.notifications.push(
                    NotificationKind::Webhook,
                    "Workflow",
                    "Webhook endpoint rejected the request",
                );
            }
            Err(err) => {
                self.notifications.push(
                    NotificationKind::Config,
                    "Workflow",
                    format!("{:#}", err),
                );
            }
        }
    }

    /// Renew the push-notification channel when it is missing or expiring.
    ///
    /// Polling stays the primary sync path; the watch only exists so a
    /// future push consumer has a live channel.
    fn check_watch(&self, now: DateTime<Utc>) {
        let Some(topic) = self.settings.pubsub_topic.as_deref() else {
            return;
        };

        let needs_renewal = match self.store.get_sync_status(&self.user_email) {
            Ok(Some(status)) => status.watch_needs_renewal(now),
            Ok(None) => false, // not initialized yet; next check catches it
            Err(err) => {
                warn!("Could not read sync status for watch check: {:#}", err);
                return;
            }
        };
        if !needs_renewal {
            return;
        }

        match self.gmail.watch(topic) {
            Ok(response) => match parse_expiration_millis(&response.expiration) {
                Some(expiration) => {
                    if let Err(err) = self
                        .store
                        .update_watch_expiration(&self.user_email, expiration)
                    {
                        warn!("Failed to store watch expiration: {:#}", err);
                    } else {
                        info!("Watch renewed until {}", expiration);
                    }
                }
                None => warn!(
                    "Watch response carried unparsable expiration: {}",
                    response.expiration
                ),
            },
            Err(err) => warn!("Failed to renew watch: {:#}", err),
        }
    }
}

/// Gmail returns watch expirations as epoch milliseconds in a string.
fn parse_expiration_millis(raw: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = raw.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_expiration_millis() {
        let expiration = parse_expiration_millis("1735689600000").unwrap();
        assert_eq!(expiration, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_expiration_rejects_garbage() {
        assert!(parse_expiration_millis("soon").is_none());
        assert!(parse_expiration_millis("").is_none());
    }
}
