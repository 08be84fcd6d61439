//! Push notification payloads.
//!
//! The service worker intercepts raw push events and parses the JSON body
//! itself instead of relying on the transport's automatic display. The
//! payload carries two optional field sets, `data` and `notification`;
//! `data` wins field by field. Clicking the shown notification either
//! focuses an already-open portal window or opens a new one.
//!
//! This module is the payload/decision half of that flow; the worker-side
//! event wiring is described in the root docs crate.

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_TITLE: &str = "Tatame";
pub const DEFAULT_ICON: &str = "/icons/icon-192.png";
pub const DEFAULT_URL: &str = "/";

#[derive(Error, Debug)]
pub enum PushError {
    #[error("malformed push payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Deserialize, Default)]
struct RawFields {
    title: Option<String>,
    body: Option<String>,
    icon: Option<String>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct RawPayload {
    data: Option<RawFields>,
    notification: Option<RawFields>,
}

/// What actually gets displayed, with every field defaulted.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub url: String,
}

pub fn parse_push_payload(raw: &[u8]) -> Result<Notice, PushError> {
    let payload: RawPayload = serde_json::from_slice(raw)?;
    let data = payload.data.unwrap_or_default();
    let notification = payload.notification.unwrap_or_default();

    let pick = |field: fn(&RawFields) -> Option<String>, fallback: &str| {
        field(&data)
            .or_else(|| field(&notification))
            .unwrap_or_else(|| fallback.to_string())
    };

    Ok(Notice {
        title: pick(|f| f.title.clone(), DEFAULT_TITLE),
        body: pick(|f| f.body.clone(), ""),
        icon: pick(|f| f.icon.clone(), DEFAULT_ICON),
        url: pick(|f| f.url.clone(), DEFAULT_URL),
    })
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClickAction {
    /// Focus the open window at this index.
    Focus(usize),
    /// No open window matches, open a new one at this URL.
    Open(String),
}

/// Click-navigation rule: focus the first open window whose URL contains the
/// notice URL as a substring, otherwise open a new one.
pub fn click_action(notice_url: &str, open_windows: &[String]) -> ClickAction {
    match open_windows.iter().position(|w| w.contains(notice_url)) {
        Some(index) => ClickAction::Focus(index),
        None => ClickAction::Open(notice_url.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_wins_over_notification_per_field() {
        let raw = br#"{
            "data": { "title": "Exam results", "url": "/exams" },
            "notification": { "title": "ignored", "body": "Belt exam graded" }
        }"#;
        let notice = parse_push_payload(raw).unwrap();
        assert_eq!(notice.title, "Exam results");
        assert_eq!(notice.body, "Belt exam graded");
        assert_eq!(notice.url, "/exams");
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let notice = parse_push_payload(b"{}").unwrap();
        assert_eq!(notice.title, DEFAULT_TITLE);
        assert_eq!(notice.body, "");
        assert_eq!(notice.icon, DEFAULT_ICON);
        assert_eq!(notice.url, DEFAULT_URL);
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(parse_push_payload(b"not json").is_err());
        assert!(parse_push_payload(br#"{"data": 3}"#).is_err());
    }

    #[test]
    fn test_click_focuses_first_matching_window() {
        let windows = vec![
            "https://portal.example/profile".to_string(),
            "https://portal.example/dues/2026-02".to_string(),
            "https://portal.example/dues/2026-03".to_string(),
        ];
        assert_eq!(click_action("/dues", &windows), ClickAction::Focus(1));
    }

    #[test]
    fn test_click_opens_when_nothing_matches() {
        let windows = vec!["https://portal.example/profile".to_string()];
        assert_eq!(
            click_action("/exams", &windows),
            ClickAction::Open("/exams".to_string())
        );
    }
}
