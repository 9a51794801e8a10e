//! Work queues over Redis Streams.

use std::time::Duration;

use rand::Rng;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::task::{QueueName, QueueTask};

/// Dead-letter ring retains the last 200 failures per queue.
const DEAD_LETTER_RETAIN: usize = 200;

/// Completion ring retains the last 100 completions per queue.
const COMPLETION_RETAIN: usize = 100;

/// Attempt counters expire after 24 hours.
const RETRY_COUNTER_TTL_SECS: i64 = 86_400;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Prefix for all queue keys
    pub key_prefix: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Visibility window before an unacked task may be reclaimed
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "clipforge".to_string(),
            consumer_group: "clipforge:workers".to_string(),
            visibility_timeout: Duration::from_secs(600),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("QUEUE_KEY_PREFIX")
                .unwrap_or_else(|_| "clipforge".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "clipforge:workers".to_string()),
            visibility_timeout: Duration::from_secs(
                std::env::var("QUEUE_VISIBILITY_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }
}

/// Queue broker client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new queue broker.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    fn stream_key(&self, queue: QueueName) -> String {
        format!("{}:q:{}", self.config.key_prefix, queue)
    }

    fn scheduled_key(&self, queue: QueueName) -> String {
        format!("{}:scheduled:{}", self.config.key_prefix, queue)
    }

    fn dead_letter_key(&self, queue: QueueName) -> String {
        format!("{}:dlq:{}", self.config.key_prefix, queue)
    }

    fn completion_key(&self, queue: QueueName) -> String {
        format!("{}:done:{}", self.config.key_prefix, queue)
    }

    fn retry_counter_key(&self, task_key: &str) -> String {
        format!("{}:retry:{}", self.config.key_prefix, task_key)
    }

    /// Initialize consumer groups for every active queue.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        for queue in QueueName::ACTIVE {
            let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(self.stream_key(queue))
                .arg(&self.config.consumer_group)
                .arg("$")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;

            match result {
                Ok(_) => info!(queue = %queue, "Created consumer group"),
                Err(e) if e.to_string().contains("BUSYGROUP") => {
                    debug!(queue = %queue, "Consumer group already exists");
                }
                Err(e) => return Err(QueueError::Redis(e)),
            }
        }

        Ok(())
    }

    /// Enqueue a task on its queue.
    pub async fn enqueue(&self, task: &QueueTask) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(task)?;

        let message_id: String = redis::cmd("XADD")
            .arg(self.stream_key(task.queue()))
            .arg("*")
            .arg("task")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        info!(
            queue = %task.queue(),
            job_id = %task.job_id(),
            message_id = %message_id,
            "Enqueued task"
        );

        Ok(message_id)
    }

    /// Enqueue a task with a visibility delay.
    ///
    /// The payload is stored in a per-queue sorted set scored by the epoch
    /// second at which it becomes visible; `promote_due` moves due payloads
    /// onto the stream. This is the redelivery mechanism behind backoff.
    pub async fn enqueue_delayed(&self, task: &QueueTask, delay: Duration) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(task)?;

        let now = chrono::Utc::now().timestamp() as u64;
        let visible_at = now + delay.as_secs();

        redis::cmd("ZADD")
            .arg(self.scheduled_key(task.queue()))
            .arg(visible_at)
            .arg(&payload)
            .query_async::<()>(&mut conn)
            .await?;

        info!(
            queue = %task.queue(),
            job_id = %task.job_id(),
            delay_secs = delay.as_secs(),
            "Scheduled delayed task"
        );

        Ok(())
    }

    /// Move due delayed tasks onto the stream.
    ///
    /// Called periodically by each executor. Returns the number promoted.
    pub async fn promote_due(&self, queue: QueueName) -> QueueResult<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let now = chrono::Utc::now().timestamp() as u64;
        let scheduled_key = self.scheduled_key(queue);

        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(&scheduled_key)
            .arg(0)
            .arg(now)
            .query_async(&mut conn)
            .await?;

        if due.is_empty() {
            return Ok(0);
        }

        let mut moved = 0;
        for payload in &due {
            match serde_json::from_str::<QueueTask>(payload) {
                Ok(task) => match self.enqueue(&task).await {
                    Ok(_) => moved += 1,
                    Err(e) => {
                        warn!(queue = %queue, error = %e, "Failed to promote scheduled task");
                        continue; // leave in the scheduled set
                    }
                },
                Err(e) => {
                    warn!(queue = %queue, error = %e, "Dropping unparseable scheduled task");
                }
            }

            redis::cmd("ZREM")
                .arg(&scheduled_key)
                .arg(payload)
                .query_async::<()>(&mut conn)
                .await
                .ok();
        }

        if moved > 0 {
            info!(queue = %queue, count = moved, "Promoted scheduled tasks");
        }

        Ok(moved)
    }

    /// Reserve tasks from a queue.
    ///
    /// At-least-once: reserved tasks stay pending until acked; a crash leaves
    /// them claimable via `claim_stale`.
    pub async fn reserve(
        &self,
        queue: QueueName,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueTask)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(self.stream_key(queue))
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut tasks = Vec::new();

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();

                if let Some(redis::Value::BulkString(payload)) = entry.map.get("task") {
                    let payload_str = String::from_utf8_lossy(payload);
                    match serde_json::from_str::<QueueTask>(&payload_str) {
                        Ok(task) => {
                            debug!(queue = %queue, job_id = %task.job_id(), "Reserved task");
                            tasks.push((message_id, task));
                        }
                        Err(e) => {
                            warn!(queue = %queue, error = %e, "Acking malformed task payload");
                            self.remove(queue, &message_id).await.ok();
                        }
                    }
                }
            }
        }

        Ok(tasks)
    }

    /// Claim tasks pending longer than the visibility window (crashed workers).
    pub async fn claim_stale(
        &self,
        queue: QueueName,
        consumer_name: &str,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueTask)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let min_idle_ms = self.config.visibility_timeout.as_millis() as u64;
        let stream_key = self.stream_key(queue);

        let pending_count: usize = redis::cmd("XPENDING")
            .arg(&stream_key)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await
            .map(|reply: redis::streams::StreamPendingReply| reply.count())
            .unwrap_or(0);

        if pending_count == 0 {
            return Ok(Vec::new());
        }

        let pending_details: Vec<Vec<redis::Value>> = redis::cmd("XPENDING")
            .arg(&stream_key)
            .arg(&self.config.consumer_group)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut to_claim = Vec::new();
        for detail in pending_details {
            // Format: [id, consumer, idle_time_ms, delivery_count]
            if let (Some(redis::Value::BulkString(id_bytes)), Some(redis::Value::Int(idle_ms))) =
                (detail.first(), detail.get(2))
            {
                if *idle_ms as u64 >= min_idle_ms {
                    if let Ok(id) = String::from_utf8(id_bytes.clone()) {
                        to_claim.push(id);
                    }
                }
            }
        }

        if to_claim.is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&stream_key)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms);
        for id in &to_claim {
            cmd.arg(id);
        }

        let claimed: Vec<Vec<redis::Value>> = cmd.query_async(&mut conn).await?;

        let mut tasks = Vec::new();
        for message in claimed {
            // Format: [id, [field, value, ...]]
            let (Some(redis::Value::BulkString(id_bytes)), Some(redis::Value::Array(fields))) =
                (message.first(), message.get(1))
            else {
                continue;
            };
            let Ok(message_id) = String::from_utf8(id_bytes.clone()) else {
                continue;
            };

            let mut payload: Option<String> = None;
            let mut i = 0;
            while i + 1 < fields.len() {
                if let (
                    Some(redis::Value::BulkString(field_bytes)),
                    Some(redis::Value::BulkString(value_bytes)),
                ) = (fields.get(i), fields.get(i + 1))
                {
                    if field_bytes.as_slice() == b"task" {
                        payload = String::from_utf8(value_bytes.clone()).ok();
                        break;
                    }
                }
                i += 2;
            }

            if let Some(payload) = payload {
                match serde_json::from_str::<QueueTask>(&payload) {
                    Ok(task) => {
                        info!(queue = %queue, job_id = %task.job_id(), "Claimed stale task");
                        tasks.push((message_id, task));
                    }
                    Err(e) => {
                        warn!(queue = %queue, error = %e, "Acking malformed claimed payload");
                        self.remove(queue, &message_id).await.ok();
                    }
                }
            }
        }

        Ok(tasks)
    }

    /// Acknowledge a completed task and record it in the completion ring.
    pub async fn ack(&self, queue: QueueName, message_id: &str, task: &QueueTask) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        self.remove(queue, message_id).await?;

        let payload = serde_json::to_string(task)?;
        redis::cmd("XADD")
            .arg(self.completion_key(queue))
            .arg("MAXLEN")
            .arg("~")
            .arg(COMPLETION_RETAIN)
            .arg("*")
            .arg("task")
            .arg(&payload)
            .query_async::<()>(&mut conn)
            .await?;

        conn.del::<_, ()>(self.retry_counter_key(&task.retry_key()))
            .await?;

        debug!(queue = %queue, message_id = %message_id, "Acked task");
        Ok(())
    }

    /// Negatively acknowledge a failed task.
    ///
    /// The attempt counter is incremented; when attempts reach the task's
    /// policy maximum the task moves to the dead-letter ring, otherwise it is
    /// rescheduled with exponential backoff plus jitter. Either way the
    /// original message is removed from the stream, so tasks are never
    /// silently dropped and never redelivered twice for one failure.
    ///
    /// Returns the attempt count after the increment.
    pub async fn nack(
        &self,
        queue: QueueName,
        message_id: &str,
        task: &QueueTask,
        error: &str,
    ) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let policy = task.retry_policy();

        let counter_key = self.retry_counter_key(&task.retry_key());
        let attempts: u32 = conn.incr(&counter_key, 1).await?;
        conn.expire::<_, ()>(&counter_key, RETRY_COUNTER_TTL_SECS)
            .await?;

        if attempts >= policy.max_attempts {
            let payload = serde_json::to_string(task)?;
            redis::cmd("XADD")
                .arg(self.dead_letter_key(queue))
                .arg("MAXLEN")
                .arg("~")
                .arg(DEAD_LETTER_RETAIN)
                .arg("*")
                .arg("task")
                .arg(&payload)
                .arg("error")
                .arg(error)
                .arg("attempts")
                .arg(attempts)
                .query_async::<()>(&mut conn)
                .await?;

            conn.del::<_, ()>(&counter_key).await?;

            warn!(
                queue = %queue,
                job_id = %task.job_id(),
                attempts = attempts,
                error = %error,
                "Task exhausted retries, moved to dead-letter ring"
            );
        } else {
            let delay = policy.delay_for_attempt(attempts) + self.jitter(policy.base_delay);
            info!(
                queue = %queue,
                job_id = %task.job_id(),
                attempts = attempts,
                delay_secs = delay.as_secs(),
                error = %error,
                "Task failed, rescheduling with backoff"
            );
            self.enqueue_delayed(task, delay).await?;
        }

        // Remove the original message only after the task is parked in the
        // dead-letter ring or the scheduled set, so a crash mid-nack leaves
        // it pending (redelivered via claim) rather than dropped.
        self.remove(queue, message_id).await?;

        Ok(attempts)
    }

    /// Dead-letter a task immediately, bypassing remaining retries.
    ///
    /// Used for terminal errors (invalid input, missing rows) where retrying
    /// cannot succeed.
    pub async fn dead_letter(
        &self,
        queue: QueueName,
        message_id: &str,
        task: &QueueTask,
        error: &str,
    ) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(task)?;

        redis::cmd("XADD")
            .arg(self.dead_letter_key(queue))
            .arg("MAXLEN")
            .arg("~")
            .arg(DEAD_LETTER_RETAIN)
            .arg("*")
            .arg("task")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .query_async::<()>(&mut conn)
            .await?;

        self.remove(queue, message_id).await?;
        conn.del::<_, ()>(self.retry_counter_key(&task.retry_key()))
            .await?;

        warn!(queue = %queue, job_id = %task.job_id(), error = %error, "Task dead-lettered");
        Ok(())
    }

    /// Current attempt count for a task.
    pub async fn attempts(&self, task: &QueueTask) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let count: Option<u32> = conn.get(self.retry_counter_key(&task.retry_key())).await?;
        Ok(count.unwrap_or(0))
    }

    /// Queue length.
    pub async fn len(&self, queue: QueueName) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(self.stream_key(queue)).await?;
        Ok(len)
    }

    /// Dead-letter ring length.
    pub async fn dead_letter_len(&self, queue: QueueName) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(self.dead_letter_key(queue)).await?;
        Ok(len)
    }

    /// XACK + XDEL a message.
    async fn remove(&self, queue: QueueName, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stream_key = self.stream_key(queue);

        redis::cmd("XACK")
            .arg(&stream_key)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&stream_key)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    /// Random jitter in [0, base).
    fn jitter(&self, base: Duration) -> Duration {
        let max_ms = base.as_millis().max(1) as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}
