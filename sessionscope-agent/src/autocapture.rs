// Copyright 2025 SessionScope (https://github.com/sessionscope)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Auto-capture reducers: raw UI signals in, low-noise events out.
//!
//! These are pure functions and plain state machines. The host
//! embedding feeds raw click chains, scroll positions, navigations,
//! and rejection messages; everything here decides what is signal and
//! what is noise.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::BTreeMap;

/// Interactive elements worth capturing; clicks that resolve to nothing
/// in this set are dropped as noise.
pub const CLICKABLE_TAGS: [&str; 18] = [
    "A", "BUTTON", "INPUT", "LABEL", "SELECT", "TEXTAREA", "H1", "H2", "H3", "H4", "H5", "H6",
    "P", "DIALOG", "OPTION", "LEGEND", "LI", "FORM",
];

/// Scroll-depth milestones; each fires at most once per page lifetime.
pub const SCROLL_MILESTONES: [i64; 5] = [10, 25, 50, 75, 97];

const SCROLL_THROTTLE_SECS: i64 = 2;

/// An event ready to ship via `capture_event`.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    pub event_type: String,
    pub payload: Option<String>,
    pub uri: Option<String>,
}

/// One element in a click's ancestor chain, target first.
#[derive(Debug, Clone, Default)]
pub struct ElementInfo {
    pub tag: String,
    pub text: Option<String>,
    pub aria_label: Option<String>,
    pub data_attributes: BTreeMap<String, String>,
}

/// A raw click as reported by the host embedding.
#[derive(Debug, Clone, Default)]
pub struct ClickSignal {
    /// Ancestor chain from the click target up to the document root.
    pub chain: Vec<ElementInfo>,
    pub page_x: Option<f64>,
    pub page_y: Option<f64>,
    pub uri: Option<String>,
}

/// Resolve a click to an event, or `None` when no ancestor matches the
/// interactive allow-list.
pub fn click_event(signal: &ClickSignal) -> Option<CapturedEvent> {
    let element = signal
        .chain
        .iter()
        .find(|e| CLICKABLE_TAGS.contains(&e.tag.to_uppercase().as_str()))?;

    // Identifier fallback chain: visible text, then aria-label, then
    // data-* attributes.
    let identifier = match element.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => json!(text),
        _ => match element.aria_label.as_deref() {
            Some(label) if !label.is_empty() => json!(label),
            _ if !element.data_attributes.is_empty() => json!(element.data_attributes),
            _ => serde_json::Value::Null,
        },
    };

    let payload = json!({
        "elementType": element.tag.to_uppercase(),
        "identifier": identifier,
        "x": signal.page_x,
        "y": signal.page_y,
    });

    Some(CapturedEvent {
        event_type: "Click".to_string(),
        payload: Some(payload.to_string()),
        uri: signal.uri.clone(),
    })
}

/// SPA history mutation → page view.
pub fn page_view_event(title: &str, uri: &str) -> CapturedEvent {
    CapturedEvent {
        event_type: "PageView".to_string(),
        payload: Some(json!({ "title": title }).to_string()),
        uri: Some(uri.to_string()),
    }
}

/// Unhandled rejection → error event.
pub fn error_event(message: Option<&str>, uri: &str) -> CapturedEvent {
    CapturedEvent {
        event_type: "Error".to_string(),
        payload: Some(json!({ "message": message }).to_string()),
        uri: Some(uri.to_string()),
    }
}

/// Scroll-depth tracking: throttled to one check per 2 seconds, one
/// event per crossed milestone, each milestone consumed once per page
/// lifetime.
pub struct ScrollTracker {
    last_check: Option<DateTime<Utc>>,
    pending: Vec<i64>,
    high_water: i64,
}

impl Default for ScrollTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollTracker {
    pub fn new() -> Self {
        Self {
            last_check: None,
            pending: SCROLL_MILESTONES.to_vec(),
            high_water: 0,
        }
    }

    /// Feed one scroll observation. `scrollable_height` is the page
    /// height minus the viewport height.
    pub fn observe(
        &mut self,
        now: DateTime<Utc>,
        scroll_y: f64,
        scrollable_height: f64,
        uri: &str,
    ) -> Option<CapturedEvent> {
        if let Some(last) = self.last_check {
            if now - last < Duration::seconds(SCROLL_THROTTLE_SECS) {
                return None;
            }
        }
        self.last_check = Some(now);

        if scrollable_height <= 0.0 || scroll_y < 0.0 {
            return None;
        }
        let percentage = ((scroll_y / scrollable_height) * 100.0).round() as i64;

        let crossed = self
            .pending
            .iter()
            .any(|milestone| percentage > *milestone && percentage > self.high_water);
        if !crossed {
            return None;
        }

        self.high_water = percentage;
        // Consumed milestones leave the pending set for good.
        self.pending.retain(|milestone| *milestone > percentage);

        Some(CapturedEvent {
            event_type: "Scroll".to_string(),
            payload: Some(json!({ "percentage": percentage }).to_string()),
            uri: Some(uri.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: &str) -> ElementInfo {
        ElementInfo {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_click_walks_up_to_interactive_ancestor() {
        let signal = ClickSignal {
            chain: vec![element("SPAN"), element("DIV"), element("BUTTON")],
            page_x: Some(10.0),
            page_y: Some(20.0),
            uri: Some("https://example.com".to_string()),
        };

        let event = click_event(&signal).unwrap();
        assert_eq!(event.event_type, "Click");
        let payload: serde_json::Value = serde_json::from_str(event.payload.as_deref().unwrap()).unwrap();
        assert_eq!(payload["elementType"], "BUTTON");
        assert_eq!(payload["x"], 10.0);
    }

    #[test]
    fn test_click_without_interactive_ancestor_is_noise() {
        let signal = ClickSignal {
            chain: vec![element("SPAN"), element("DIV"), element("BODY")],
            ..Default::default()
        };
        assert!(click_event(&signal).is_none());
    }

    #[test]
    fn test_click_identifier_fallback_chain() {
        // Visible text wins.
        let mut with_text = element("BUTTON");
        with_text.text = Some("  Buy now  ".to_string());
        with_text.aria_label = Some("buy".to_string());
        let event = click_event(&ClickSignal {
            chain: vec![with_text],
            ..Default::default()
        })
        .unwrap();
        let payload: serde_json::Value = serde_json::from_str(event.payload.as_deref().unwrap()).unwrap();
        assert_eq!(payload["identifier"], "Buy now");

        // Aria-label next.
        let mut with_aria = element("BUTTON");
        with_aria.aria_label = Some("close dialog".to_string());
        let event = click_event(&ClickSignal {
            chain: vec![with_aria],
            ..Default::default()
        })
        .unwrap();
        let payload: serde_json::Value = serde_json::from_str(event.payload.as_deref().unwrap()).unwrap();
        assert_eq!(payload["identifier"], "close dialog");

        // Data attributes last.
        let mut with_data = element("BUTTON");
        with_data
            .data_attributes
            .insert("data-testid".to_string(), "cta".to_string());
        let event = click_event(&ClickSignal {
            chain: vec![with_data],
            ..Default::default()
        })
        .unwrap();
        let payload: serde_json::Value = serde_json::from_str(event.payload.as_deref().unwrap()).unwrap();
        assert_eq!(payload["identifier"]["data-testid"], "cta");

        // Nothing at all stays null.
        let event = click_event(&ClickSignal {
            chain: vec![element("BUTTON")],
            ..Default::default()
        })
        .unwrap();
        let payload: serde_json::Value = serde_json::from_str(event.payload.as_deref().unwrap()).unwrap();
        assert!(payload["identifier"].is_null());
    }

    #[test]
    fn test_scroll_milestones_fire_once() {
        let mut tracker = ScrollTracker::new();
        let mut now = Utc::now();

        // 30% crosses the 10 and 25 milestones → one event at 30.
        let event = tracker.observe(now, 30.0, 100.0, "https://example.com").unwrap();
        let payload: serde_json::Value = serde_json::from_str(event.payload.as_deref().unwrap()).unwrap();
        assert_eq!(payload["percentage"], 30);

        // Scrolling back below and up to 30% again fires nothing; the
        // milestones at or below 30 are consumed.
        now += Duration::seconds(3);
        assert!(tracker.observe(now, 28.0, 100.0, "u").is_none());
        now += Duration::seconds(3);
        assert!(tracker.observe(now, 30.0, 100.0, "u").is_none());

        // 80% crosses 50 and 75.
        now += Duration::seconds(3);
        let event = tracker.observe(now, 80.0, 100.0, "u").unwrap();
        let payload: serde_json::Value = serde_json::from_str(event.payload.as_deref().unwrap()).unwrap();
        assert_eq!(payload["percentage"], 80);

        // 98% crosses the last milestone; after that nothing remains.
        now += Duration::seconds(3);
        assert!(tracker.observe(now, 98.0, 100.0, "u").is_some());
        now += Duration::seconds(3);
        assert!(tracker.observe(now, 100.0, 100.0, "u").is_none());
    }

    #[test]
    fn test_scroll_checks_are_throttled() {
        let mut tracker = ScrollTracker::new();
        let now = Utc::now();

        assert!(tracker.observe(now, 20.0, 100.0, "u").is_some());
        // Within the 2-second window the check itself is skipped.
        assert!(tracker
            .observe(now + Duration::seconds(1), 90.0, 100.0, "u")
            .is_none());
        // After the window the 90% observation lands.
        assert!(tracker
            .observe(now + Duration::seconds(4), 90.0, 100.0, "u")
            .is_some());
    }

    #[test]
    fn test_scroll_ignores_degenerate_geometry() {
        let mut tracker = ScrollTracker::new();
        let now = Utc::now();
        assert!(tracker.observe(now, 10.0, 0.0, "u").is_none());
        assert!(tracker
            .observe(now + Duration::seconds(3), -5.0, 100.0, "u")
            .is_none());
    }

    #[test]
    fn test_page_view_and_error_events() {
        let page_view = page_view_event("Pricing", "https://example.com/pricing");
        assert_eq!(page_view.event_type, "PageView");
        assert_eq!(
            page_view.payload.as_deref(),
            Some("{\"title\":\"Pricing\"}")
        );

        let error = error_event(Some("boom"), "https://example.com");
        assert_eq!(error.event_type, "Error");
        assert_eq!(error.payload.as_deref(), Some("{\"message\":\"boom\"}"));
    }

    #[test]
    fn test_lowercase_tags_match_allow_list() {
        let signal = ClickSignal {
            chain: vec![element("button")],
            ..Default::default()
        };
        assert!(click_event(&signal).is_some());
    }
}
