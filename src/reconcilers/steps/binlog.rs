//! Extraction of the last captured binlog event time

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::adapters::{context_config_map_name, LAST_EVENT_TIMESTAMP_KEY};
use crate::control::{BackupContext, Outcome, Step};
use crate::error::{Error, Result};

/// Parse an RFC 3339 timestamp or integer Unix seconds
pub fn parse_event_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| Error::job(format!("Invalid last event timestamp '{}'", raw)))
}

/// Read the timestamp the binlog backup job recorded and store it in status
pub struct ExtractLastEventTimestamp;

#[async_trait]
impl Step for ExtractLastEventTimestamp {
    fn name(&self) -> &'static str {
        "ExtractLastEventTimestamp"
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        if ctx.status().last_event_timestamp.is_some() {
            return Outcome::Continue;
        }

        let cm_name = context_config_map_name(ctx.name());
        let config_map = match ctx
            .control_plane()
            .get_config_map(ctx.namespace(), &cm_name)
            .await
        {
            Ok(Some(cm)) => cm,
            Ok(None) => {
                return Outcome::fail(Error::ConfigMapNotFound(format!(
                    "{}/{}",
                    ctx.namespace(),
                    cm_name
                )))
            }
            Err(e) => return Outcome::Fail(e),
        };

        let Some(raw) = config_map
            .data
            .as_ref()
            .and_then(|d| d.get(LAST_EVENT_TIMESTAMP_KEY))
        else {
            return Outcome::fail(Error::job(format!(
                "Binlog backup job did not record '{}' in {}",
                LAST_EVENT_TIMESTAMP_KEY, cm_name
            )));
        };

        let timestamp = match parse_event_timestamp(raw) {
            Ok(ts) => ts,
            Err(e) => return Outcome::Fail(e),
        };
        info!(name = %ctx.name(), last_event_timestamp = %timestamp, "Recorded last binlog event time");
        ctx.set_last_event_timestamp(timestamp).into()
    }
}
