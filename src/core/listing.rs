use crate::domain::model::{Listing, Permissions, RemoteEntry};
use crate::utils::error::{HfsError, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// 解析 `get_file_list` 回應
///
/// HFS answers in event-stream framing; only the first `data:` line carries the
/// listing JSON.
pub fn parse_file_list(body: &str, path: &str) -> Result<Listing> {
    let first_line = body.lines().next().unwrap_or("");
    let payload = first_line.strip_prefix("data: ").unwrap_or(first_line).trim();

    let json: Value = serde_json::from_str(payload)?;
    let obj = json.as_object().ok_or_else(|| HfsError::InvalidResponse {
        message: "file list is not a JSON object".to_string(),
    })?;

    let list = obj
        .get("list")
        .and_then(Value::as_array)
        .ok_or_else(|| HfsError::InvalidResponse {
            message: "file list response has no \"list\" array".to_string(),
        })?;

    let flag = |key: &str| obj.get(key).and_then(Value::as_bool).unwrap_or(false);
    let permissions = Permissions {
        can_archive: flag("can_archive"),
        can_upload: flag("can_upload"),
        can_delete: flag("can_delete"),
        can_overwrite: flag("can_overwrite"),
        can_comment: flag("can_comment"),
    };

    let entries = list
        .iter()
        .filter_map(|item| parse_entry(item, path))
        .collect::<Vec<_>>();

    tracing::debug!("Parsed {} entries for {}", entries.len(), path);
    Ok(Listing {
        entries,
        permissions,
    })
}

fn parse_entry(item: &Value, path: &str) -> Option<RemoteEntry> {
    // 沒有名稱的項目直接略過
    let raw_name = item.get("n")?.as_str()?;
    let is_directory = raw_name.ends_with('/');
    let name = raw_name.trim_end_matches('/').to_string();

    let size = item.get("s").and_then(Value::as_u64).unwrap_or(0);
    let modified_at = item
        .get("m")
        .and_then(Value::as_str)
        .and_then(parse_timestamp);
    let comment = item
        .get("c")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Some(RemoteEntry {
        name,
        size,
        modified_at,
        path: path.to_string(),
        is_directory,
        comment,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!("Ignoring unparsable timestamp '{}': {}", raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = concat!(
        r#"data: {"can_archive":true,"can_upload":false,"can_delete":true,"list":["#,
        r#"{"n":"docs/","m":"2024-03-01T12:00:00.000Z"},"#,
        r#"{"n":"9384.img","s":4096,"m":"2024-03-02T08:30:00.000Z","c":"disk image"},"#,
        r#"{"s":12}"#,
        "]}\n",
        "\n",
        "data: \"end\"\n"
    );

    #[test]
    fn test_parse_entries() {
        let listing = parse_file_list(SAMPLE, "/").unwrap();
        assert_eq!(listing.entries.len(), 2);

        let docs = &listing.entries[0];
        assert_eq!(docs.name, "docs");
        assert!(docs.is_directory);
        assert_eq!(docs.size, 0);
        assert_eq!(docs.path, "/");

        let img = &listing.entries[1];
        assert_eq!(img.name, "9384.img");
        assert!(!img.is_directory);
        assert_eq!(img.size, 4096);
        assert_eq!(img.comment.as_deref(), Some("disk image"));
        assert_eq!(
            img.modified_at.unwrap().to_rfc3339(),
            "2024-03-02T08:30:00+00:00"
        );
    }

    #[test]
    fn test_parse_permissions() {
        let listing = parse_file_list(SAMPLE, "/").unwrap();
        assert!(listing.permissions.can_archive);
        assert!(!listing.permissions.can_upload);
        assert!(listing.permissions.can_delete);
        assert!(!listing.permissions.can_comment);
    }

    #[test]
    fn test_plain_json_body() {
        let listing = parse_file_list(r#"{"list":[]}"#, "/empty").unwrap();
        assert!(listing.entries.is_empty());
    }

    #[test]
    fn test_missing_list_is_invalid() {
        let err = parse_file_list(r#"data: {"can_upload":true}"#, "/").unwrap_err();
        assert!(matches!(err, HfsError::InvalidResponse { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_file_list("data: {not json", "/").unwrap_err();
        assert!(matches!(err, HfsError::SerializationError(_)));
    }

    #[test]
    fn test_bad_timestamp_is_dropped() {
        let listing =
            parse_file_list(r#"data: {"list":[{"n":"a.txt","m":"yesterday"}]}"#, "/").unwrap();
        assert_eq!(listing.entries[0].modified_at, None);
    }
}
