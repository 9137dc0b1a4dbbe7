use mediasweep_core::payload::normalize_content;
use mediasweep_core::{ChatClient, MediaRef, RoomEvent, UploadRecord};
use mediasweep_ledger::UploadLedger;

/// Counters from one ingestion pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub rooms_scanned: usize,
    pub rooms_failed: usize,
    pub media_events: usize,
    pub inserted: usize,
}

/// Walk recent history of every joined room (restricted to `allowlist` when
/// non-empty) and record media uploads. A failing room is logged and skipped.
pub fn sync_uploads(
    client: &dyn ChatClient,
    ledger: &UploadLedger,
    allowlist: &[String],
    history_limit: u32,
) -> anyhow::Result<IngestReport> {
    let mut rooms = client.list_joined_rooms()?;
    if !allowlist.is_empty() {
        rooms.retain(|r| allowlist.contains(r));
    }

    let mut report = IngestReport::default();
    for room_id in &rooms {
        let events = match client.fetch_recent_messages(room_id, history_limit) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(room_id = %room_id, error = %e, "history fetch failed, skipping room");
                report.rooms_failed += 1;
                continue;
            }
        };
        report.rooms_scanned += 1;

        for event in &events {
            let Some(record) = upload_from_event(room_id, event) else {
                continue;
            };
            report.media_events += 1;
            if ledger.upsert(&record)? {
                report.inserted += 1;
                tracing::debug!(event_id = %record.event_id, media_ref = %record.media_ref, "upload recorded");
            }
        }
    }

    tracing::info!(
        rooms = report.rooms_scanned,
        failed = report.rooms_failed,
        media = report.media_events,
        inserted = report.inserted,
        "ingestion finished"
    );
    Ok(report)
}

/// Build a ledger row from a timeline event, if it carries a valid media reference.
pub fn upload_from_event(room_id: &str, event: &RoomEvent) -> Option<UploadRecord> {
    if !event.may_carry_media() {
        return None;
    }
    let payload = normalize_content(&event.content)?;
    MediaRef::parse(&payload.media_ref)?;
    let room_id = if event.room_id.is_empty() {
        room_id
    } else {
        event.room_id.as_str()
    };
    Some(UploadRecord {
        event_id: event.event_id.clone(),
        room_id: room_id.to_string(),
        sender_id: event.sender.clone(),
        media_ref: payload.media_ref,
        mime_type: payload.mime_type,
        size_bytes: payload.size_bytes,
        observed_at: event.origin_server_ts,
    })
}
