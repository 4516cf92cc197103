//! Reading delivery metadata from AMQP message headers.

use lapin::types::{AMQPValue, FieldTable};

use crate::domain::{TRACE_ID_HEADER, TraceId};

/// Header quorum queues use to report earlier delivery attempts.
pub(super) const DELIVERY_COUNT_HEADER: &str = "x-delivery-count";

fn find<'a>(headers: Option<&'a FieldTable>, name: &str) -> Option<&'a AMQPValue> {
    headers?
        .inner()
        .iter()
        .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn as_text(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(text) => Some(String::from_utf8_lossy(text.as_bytes()).into_owned()),
        AMQPValue::ShortString(text) => Some(text.as_str().to_owned()),
        _ => None,
    }
}

fn as_count(value: &AMQPValue) -> Option<u32> {
    let wide = match value {
        AMQPValue::ShortShortInt(v) => i64::from(*v),
        AMQPValue::ShortShortUInt(v) => i64::from(*v),
        AMQPValue::ShortInt(v) => i64::from(*v),
        AMQPValue::ShortUInt(v) => i64::from(*v),
        AMQPValue::LongInt(v) => i64::from(*v),
        AMQPValue::LongUInt(v) => i64::from(*v),
        AMQPValue::LongLongInt(v) => *v,
        _ => return None,
    };
    u32::try_from(wide.max(0)).ok()
}

/// Trace identifier carried by the message, if present and well formed.
pub(super) fn trace_id(headers: Option<&FieldTable>) -> Option<TraceId> {
    let raw = find(headers, TRACE_ID_HEADER).and_then(as_text)?;
    match raw.parse() {
        Ok(trace_id) => Some(trace_id),
        Err(_) => {
            tracing::debug!(value = %raw, "ignoring malformed trace id header");
            None
        }
    }
}

/// Earlier delivery attempts, from the header or the redelivered flag.
pub(super) fn delivery_count(headers: Option<&FieldTable>, redelivered: bool) -> u32 {
    find(headers, DELIVERY_COUNT_HEADER)
        .and_then(as_count)
        .unwrap_or(u32::from(redelivered))
}
