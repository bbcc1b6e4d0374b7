use crate::utils::error::{HfsError, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, SET_COOKIE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Session cookies sent with every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map<I, K, V>(cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cookies: cookies
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// 從回應的 `Set-Cookie` 標頭建立
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::new();
        for value in headers.get_all(SET_COOKIE) {
            match value.to_str() {
                Ok(raw) => {
                    if let Some((name, value)) = parse_set_cookie(raw) {
                        jar.insert(name, value);
                    }
                }
                Err(_) => tracing::warn!("Ignoring non-ASCII Set-Cookie header"),
            }
        }
        jar
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        self.cookies
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// `Cookie` request header value, `None` for an empty jar.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Name and value of a `Set-Cookie` header. Attributes are ignored.
pub fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let pair = raw.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().trim_matches('"').to_string()))
}

/// Session persisted between CLI invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    pub base_url: String,
    pub cookies: CookieJar,
    pub saved_at: DateTime<Utc>,
}

impl SessionFile {
    pub fn new(base_url: impl Into<String>, cookies: CookieJar) -> Self {
        Self {
            base_url: base_url.into(),
            cookies,
            saved_at: Utc::now(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Session saved to {}", path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let session: SessionFile = serde_json::from_str(&content)?;
        Ok(session)
    }

    /// 只接受同一台伺服器的 session
    pub fn load_for<P: AsRef<Path>>(path: P, base_url: &str) -> Result<Option<Self>> {
        if !path.as_ref().exists() {
            return Ok(None);
        }
        let session = Self::load(&path)?;
        if session.base_url.trim_end_matches('/') != base_url.trim_end_matches('/') {
            tracing::warn!(
                "Session file belongs to {}, not {}; ignoring it",
                session.base_url,
                base_url
            );
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub fn delete<P: AsRef<Path>>(path: P) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HfsError::IoError(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use tempfile::TempDir;

    #[test]
    fn test_parse_set_cookie() {
        assert_eq!(
            parse_set_cookie("hfs_http=abc123; path=/; HttpOnly"),
            Some(("hfs_http".to_string(), "abc123".to_string()))
        );
        assert_eq!(
            parse_set_cookie("token=\"quoted\""),
            Some(("token".to_string(), "quoted".to_string()))
        );
        assert_eq!(parse_set_cookie("garbage"), None);
        assert_eq!(parse_set_cookie("=value"), None);
    }

    #[test]
    fn test_jar_from_headers() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("hfs_http=s1; path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("hfs_http.sig=s2; path=/"));

        let jar = CookieJar::from_headers(&headers);
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.get("hfs_http"), Some("s1"));
        assert_eq!(
            jar.header_value().as_deref(),
            Some("hfs_http=s1; hfs_http.sig=s2")
        );
    }

    #[test]
    fn test_empty_jar_has_no_header() {
        assert_eq!(CookieJar::new().header_value(), None);
    }

    #[test]
    fn test_session_file_round_trip_and_host_check() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/session.json");

        let jar = CookieJar::from_map([("hfs_http", "abc")]);
        SessionFile::new("https://files.example.com", jar.clone())
            .save(&path)
            .unwrap();

        let loaded = SessionFile::load_for(&path, "https://files.example.com/")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.cookies, jar);

        let other = SessionFile::load_for(&path, "https://other.example.com").unwrap();
        assert!(other.is_none());

        SessionFile::delete(&path).unwrap();
        assert!(SessionFile::load_for(&path, "https://files.example.com")
            .unwrap()
            .is_none());
        SessionFile::delete(&path).unwrap();
    }
}
