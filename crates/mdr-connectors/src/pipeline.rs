//! The clean → map → optimize → validate sequence.

use crate::normalize::{clean_record, optimize_for_analysis, EventCategory};
use crate::traits::{AdapterError, AdapterResult, EndpointAdapter};
use mdr_core::{Alert, RawRecord};
use mdr_observability::MetricsCollector;
use tracing::{debug, warn};

/// Normalizes one raw vendor record into a canonical alert.
///
/// The stages always run in order:
/// 1. clean the raw record with the adapter's exclusion set,
/// 2. map it with [`EndpointAdapter::normalize_alert`],
/// 3. reduce `raw_data` to the whitelist of the event category,
/// 4. re-validate the alert.
///
/// When `category` is `None` the adapter is asked to derive one from the raw
/// record; if it cannot, the generic whitelist applies.
pub fn transform_alert<A>(
    adapter: &A,
    raw: &RawRecord,
    category: Option<EventCategory>,
) -> AdapterResult<Alert>
where
    A: EndpointAdapter + ?Sized,
{
    let metrics = MetricsCollector::new();
    let category = category
        .or_else(|| adapter.event_category(raw))
        .unwrap_or_default();

    let cleaned = clean_record(raw, adapter.excluded_keys());
    let mut alert = adapter.normalize_alert(&cleaned).map_err(|e| {
        warn!(vendor = adapter.vendor(), error = %e, "Vendor mapping failed");
        metrics.record_alert_rejected(adapter.vendor());
        e
    })?;

    alert.raw_data = optimize_for_analysis(&alert.raw_data, category);

    if let Err(e) = alert.validate() {
        warn!(vendor = adapter.vendor(), error = %e, "Normalized alert failed validation");
        metrics.record_alert_rejected(adapter.vendor());
        return Err(AdapterError::Validation(e));
    }

    debug!(
        vendor = %alert.vendor,
        alert_id = %alert.alert_id,
        category = %category,
        entities = alert.entities().len(),
        "Alert normalized"
    );
    metrics.record_alert_normalized(&alert.vendor, &alert.severity.to_string());

    Ok(alert)
}

/// Same as [`transform_alert`] for a payload that is not yet known to be an object.
pub fn transform_alert_value<A>(
    adapter: &A,
    raw: &serde_json::Value,
    category: Option<EventCategory>,
) -> AdapterResult<Alert>
where
    A: EndpointAdapter + ?Sized,
{
    let record = raw
        .as_object()
        .ok_or_else(|| AdapterError::MalformedAlert("expected a JSON object".into()))?;
    transform_alert(adapter, record, category)
}
