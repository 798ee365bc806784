use std::sync::Arc;

use serenity::all::{ChannelId, CreateAttachment, CreateMessage, Http, Mention};
use serenity::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::WorksheetsConfig;
use crate::utils::{now_in_my_timezone, user_id};
use crate::worksheets::{next_target, worksheet_filename, Worksheet};

/// Where scheduled worksheets end up.
#[async_trait]
pub trait WorksheetSink: Send + Sync + 'static {
    async fn deliver(&self, content: String, filename: String, contents: Vec<u8>) -> anyhow::Result<()>;
}

pub struct ChannelSink {
    pub http: Arc<Http>,
    pub channel_id: ChannelId,
}

#[async_trait]
impl WorksheetSink for ChannelSink {
    async fn deliver(&self, content: String, filename: String, contents: Vec<u8>) -> anyhow::Result<()> {
        let msg = CreateMessage::new().content(content).add_file(CreateAttachment::bytes(contents, filename));
        self.channel_id.send_message(self.http.as_ref(), msg).await?;
        Ok(())
    }
}

pub struct WorksheetScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl WorksheetScheduler {
    pub fn spawn<S: WorksheetSink>(sink: S, config: WorksheetsConfig) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(remind_loop(sink, config, shutdown_rx));
        WorksheetScheduler { shutdown, handle }
    }

    /// Stops the loop and waits for it, nothing is sent once this returns.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!("Worksheet scheduler panicked: {:?}", e);
        }
    }
}

async fn remind_loop<S: WorksheetSink>(sink: S, config: WorksheetsConfig, mut shutdown: watch::Receiver<bool>) {
    let mention = user_id(config.mention_user_id).map(|id| format!("{} ", Mention::from(id))).unwrap_or_default();

    loop {
        let Some(now) = now_in_my_timezone(config.utc_offset_hours) else {
            tracing::error!("Invalid worksheet utc offset {}, scheduler stopped", config.utc_offset_hours);
            return;
        };
        let target = match next_target(now, config.hour) {
            Ok(target) => target,
            Err(e) => {
                tracing::error!("Worksheet scheduler stopped: {}", e);
                return;
            }
        };
        let wait = (target - now).to_std().unwrap_or_default();
        tracing::info!("Next worksheet at {}", target.to_rfc3339());

        tokio::select! {
            _ = shutdown.changed() => {}
            _ = tokio::time::sleep(wait) => {}
        }
        if *shutdown.borrow() || shutdown.has_changed().is_err() {
            tracing::info!("Worksheet scheduler cancelled");
            return;
        }

        let worksheet = {
            let mut rng = rand::thread_rng();
            Worksheet::generate(config.operation, config.questions, &mut rng)
        };
        let filename = worksheet_filename(target.date_naive());

        if let Some(dir) = &config.archive_dir {
            if let Err(e) = worksheet.archive(dir, &filename) {
                tracing::warn!("Failed to archive worksheet {}: {}", filename, e);
            }
        }

        if let Err(e) = sink.deliver(format!("{mention}Study"), filename, worksheet.blank()).await {
            tracing::error!("Failed to deliver scheduled worksheet: {:?}", e);
        }
    }
}
