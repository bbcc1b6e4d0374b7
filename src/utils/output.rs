use reqwest::StatusCode;

/// `"201 Created"` 形式的狀態標籤
pub fn status_label(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// 依狀態碼類別挑選日誌前綴符號
pub fn status_marker(status: StatusCode) -> &'static str {
    if status.is_success() {
        "✅"
    } else if status.is_redirection() {
        "↪️"
    } else if status.is_client_error() || status.is_server_error() {
        "⚠️"
    } else {
        "ℹ️"
    }
}
