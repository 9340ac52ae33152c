use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tokio::task::JoinHandle;
use tracing::warn;

const CHAT_ACTION_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(4);
const CHAT_ACTION_MAX_FAILURES: usize = 3;

/// Keeps "typing" or "uploading photo" visible while a slow model call runs.
/// Dropping the guard stops it.
pub struct ChatActionHeartbeat {
    task_handle: Option<JoinHandle<()>>,
}

impl Drop for ChatActionHeartbeat {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

pub fn start_chat_action_heartbeat(
    bot: Bot,
    chat_id: ChatId,
    action: ChatAction,
) -> ChatActionHeartbeat {
    let task_handle = tokio::spawn(async move {
        let mut consecutive_failures = 0usize;
        loop {
            match bot.send_chat_action(chat_id, action.clone()).await {
                Ok(_) => consecutive_failures = 0,
                Err(err) => {
                    consecutive_failures += 1;
                    warn!(
                        "send_chat_action failed for chat {} ({}/{}): {err}",
                        chat_id.0, consecutive_failures, CHAT_ACTION_MAX_FAILURES
                    );
                    if consecutive_failures >= CHAT_ACTION_MAX_FAILURES {
                        break;
                    }
                }
            }
            tokio::time::sleep(CHAT_ACTION_HEARTBEAT_INTERVAL).await;
        }
    });

    ChatActionHeartbeat {
        task_handle: Some(task_handle),
    }
}
