pub mod api;

use crate::bot::api::{BotError, TelegramApi};
use crate::pipeline::Pipeline;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Reply to the /start trigger.
const GREETING: &str = "Бот запущен. Напиши вопрос о видео-метриках.";

/// The only failure text the end user ever sees. Pipeline errors carry prompt
/// and schema detail, so they stay in the operator log.
const APOLOGY: &str = "Не получилось ответить на вопрос. Попробуй переформулировать.";

const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Long-poll dispatch loop. Every inbound message is handled in its own
/// task, so a slow completion or query does not stall polling.
pub async fn run(
    api: TelegramApi,
    pipeline: Arc<Pipeline>,
    poll_timeout_seconds: u64,
) -> Result<(), BotError> {
    let api = Arc::new(api);
    let mut offset = 0i64;

    info!("Starting Telegram long-poll loop");

    loop {
        let updates = match api.get_updates(offset, poll_timeout_seconds).await {
            Ok(updates) => updates,
            Err(e) => {
                error!("Failed to poll updates: {}", e);
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                continue;
            };
            let chat_id = message.chat.id;

            let api = Arc::clone(&api);
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                let reply = reply_for(&pipeline, &text).await;
                if let Err(e) = api.send_message(chat_id, &reply).await {
                    error!("Failed to send reply to chat {}: {}", chat_id, e);
                }
            });
        }
    }
}

/// Maps one inbound text to one outbound reply. Failures are logged together
/// with the question that caused them and collapse to the apology string.
async fn reply_for(pipeline: &Pipeline, text: &str) -> String {
    if text.trim() == "/start" {
        return GREETING.to_string();
    }

    match pipeline.answer(text).await {
        Ok(value) => value.to_string(),
        Err(e) => {
            error!("Pipeline failed for question {:?}: {}", text, e);
            APOLOGY.to_string()
        }
    }
}
