//! Normalization of message content into a fixed media tuple.
//!
//! Media messages carry their reference in one of two places: plain uploads use
//! `content.url`, encrypted uploads nest it under `content.file.url`. Metadata
//! lives in `content.info` and may be missing entirely.

use serde_json::Value;

/// Media fields extracted from a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub media_ref: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Extract `{media_ref, mime_type, size}` from message content.
///
/// Precedence: `content.url`, then `content.file.url`. `info.mimetype` defaults
/// to empty and `info.size` to zero. Returns `None` when no reference is present.
pub fn normalize_content(content: &Value) -> Option<MediaPayload> {
    let media_ref = non_empty_str(content.get("url"))
        .or_else(|| non_empty_str(content.get("file").and_then(|f| f.get("url"))))?;

    let info = content.get("info").filter(|v| v.is_object());
    let mime_type = info
        .and_then(|i| i.get("mimetype"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let size_bytes = info.and_then(|i| i.get("size")).map(size_value).unwrap_or(0);

    Some(MediaPayload {
        media_ref: media_ref.to_string(),
        mime_type,
        size_bytes,
    })
}

fn non_empty_str(v: Option<&Value>) -> Option<&str> {
    v.and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// Sizes show up as integers, floats, or numeric strings. Anything else is zero.
fn size_value(v: &Value) -> u64 {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_url_with_info() {
        let p = normalize_content(&json!({
            "url": "mxc://test.com/file123",
            "info": {"mimetype": "image/png", "size": 1024}
        }))
        .unwrap();
        assert_eq!(p.media_ref, "mxc://test.com/file123");
        assert_eq!(p.mime_type, "image/png");
        assert_eq!(p.size_bytes, 1024);
    }

    #[test]
    fn encrypted_file_url() {
        let p = normalize_content(&json!({
            "file": {"url": "mxc://test.com/encrypted123", "v": "v2"},
            "info": {"mimetype": "video/mp4", "size": 2048}
        }))
        .unwrap();
        assert_eq!(p.media_ref, "mxc://test.com/encrypted123");
        assert_eq!(p.mime_type, "video/mp4");
        assert_eq!(p.size_bytes, 2048);
    }

    #[test]
    fn direct_url_wins_over_file() {
        let p = normalize_content(&json!({
            "url": "mxc://a/direct",
            "file": {"url": "mxc://a/nested"}
        }))
        .unwrap();
        assert_eq!(p.media_ref, "mxc://a/direct");
    }

    #[test]
    fn empty_direct_url_falls_back_to_file() {
        let p = normalize_content(&json!({
            "url": "",
            "file": {"url": "mxc://a/nested"}
        }))
        .unwrap();
        assert_eq!(p.media_ref, "mxc://a/nested");
    }

    #[test]
    fn missing_info_defaults() {
        let p = normalize_content(&json!({"url": "mxc://a/b"})).unwrap();
        assert_eq!(p.mime_type, "");
        assert_eq!(p.size_bytes, 0);

        let p = normalize_content(&json!({"url": "mxc://a/b", "info": "bogus"})).unwrap();
        assert_eq!(p.mime_type, "");
        assert_eq!(p.size_bytes, 0);
    }

    #[test]
    fn odd_size_shapes() {
        let with_size = |size: Value| {
            normalize_content(&json!({"url": "mxc://a/b", "info": {"size": size}}))
                .unwrap()
                .size_bytes
        };
        assert_eq!(with_size(json!("4096")), 4096);
        assert_eq!(with_size(json!(12.0)), 12);
        assert_eq!(with_size(json!(-5)), 0);
        assert_eq!(with_size(json!(null)), 0);
    }

    #[test]
    fn text_message_has_no_media() {
        assert!(normalize_content(&json!({"msgtype": "m.text", "body": "hi"})).is_none());
        assert!(normalize_content(&json!({"file": "not-an-object"})).is_none());
        assert!(normalize_content(&Value::Null).is_none());
    }
}
