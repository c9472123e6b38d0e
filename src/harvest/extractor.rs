use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::app::{MagpieError, Result};
use crate::config::SelectorConfig;
use crate::domain::ReviewRecord;

/// Builds the in-page scripts that drive the review panel and maps their
/// results to [`ReviewRecord`]s.
///
/// Everything that can be expressed as an in-page query is: expanding
/// truncated text, reading counts, pulling whole batches. One `evaluate`
/// per scroll cycle instead of one simulated interaction per review is the
/// main throughput lever.
pub struct ReviewExtractor {
    selectors: SelectorConfig,
}

/// Raw shape returned by the batch extraction script.
#[derive(Debug, Deserialize)]
struct RawReview {
    review_id: Option<String>,
    author: Option<String>,
    rating: Option<u8>,
    date: Option<String>,
    text: Option<String>,
    language: Option<String>,
}

impl ReviewExtractor {
    pub fn new(selectors: SelectorConfig) -> Self {
        Self { selectors }
    }

    fn js_string_array(items: &[String]) -> String {
        items
            .iter()
            .map(|s| format!("'{}'", s.replace('\'', "\\'")))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Probe page readiness and block/CAPTCHA markers after navigation.
    pub fn readiness_script(&self) -> String {
        r#"
        (() => {
            const pageReady = document.readyState === 'complete'
                || document.readyState === 'interactive';
            const blocked = !!document.querySelector('form#captcha-form')
                || !!document.querySelector('div#recaptcha')
                || document.title.toLowerCase().includes('unusual traffic');
            return { ready: pageReady, blocked: blocked };
        })()
        "#
        .to_string()
    }

    /// Locate and activate the reviews tab. Returns
    /// `{state: "opened" | "empty" | "missing"}` so the driver can tell a
    /// zero-review target apart from a panel that failed to render.
    pub fn open_panel_script(&self) -> String {
        let labels = Self::js_string_array(&self.selectors.tab_labels);
        format!(
            r#"
            (() => {{
                const labels = [{labels}];
                const buttons = Array.from(document.querySelectorAll('button'));
                const panelButton = buttons.find(b => {{
                    const text = (b.getAttribute('aria-label') || '') + ' ' + (b.textContent || '');
                    return labels.some(l => text.includes(l));
                }});
                if (panelButton) {{
                    panelButton.click();
                    return {{ state: 'opened' }};
                }}
                const header = document.querySelector('h1');
                const counted = document.querySelector(
                    'span[aria-label*="review" i], span[aria-label*="리뷰"]');
                if (header && !counted) {{
                    return {{ state: 'empty' }};
                }}
                return {{ state: 'missing' }};
            }})()
            "#
        )
    }

    /// Open the sort menu. Best-effort; returns whether the control existed.
    pub fn open_sort_menu_script(&self) -> String {
        r#"
        (() => {
            const sortMenu = Array.from(document.querySelectorAll('button')).find(b => {
                const label = b.getAttribute('aria-label') || '';
                const value = b.getAttribute('data-value') || '';
                return label.includes('Sort') || label.includes('정렬') || value.includes('정렬');
            });
            if (!sortMenu) return false;
            sortMenu.click();
            return true;
        })()
        "#
        .to_string()
    }

    /// Pick the most-recent ordering from the opened sort menu.
    pub fn choose_newest_script(&self) -> String {
        let labels = Self::js_string_array(&self.selectors.newest_labels);
        format!(
            r#"
            (() => {{
                const labels = [{labels}];
                const newestOption = Array.from(
                    document.querySelectorAll('[role="menuitemradio"]'))
                    .find(o => labels.some(l => (o.textContent || '').includes(l)));
                if (!newestOption) return false;
                newestOption.click();
                return true;
            }})()
            "#
        )
    }

    /// Scroll the review container to its bottom to trigger the next load.
    pub fn scroll_script(&self) -> String {
        format!(
            r#"
            (() => {{
                const scroller = document.querySelector('{container}');
                if (!scroller) return null;
                scroller.scrollTop = scroller.scrollHeight;
                return scroller.scrollHeight;
            }})()
            "#,
            container = self.selectors.scroll_container
        )
    }

    /// Count currently loaded review nodes.
    pub fn count_script(&self) -> String {
        format!(
            r#"
            (() => {{
                const reviewNodes = document.querySelectorAll('{node}');
                return reviewNodes.length;
            }})()
            "#,
            node = self.selectors.review_node
        )
    }

    /// Click every "show more" and "show original" control in one pass, so
    /// captured bodies are full, untranslated text. Once per scroll cycle,
    /// never once per review.
    pub fn expand_script(&self) -> String {
        format!(
            r#"
            (() => {{
                const expanders = document.querySelectorAll(
                    '{expand}, {original}');
                let clicked = 0;
                expanders.forEach(btn => {{ btn.click(); clicked += 1; }});
                return clicked;
            }})()
            "#,
            expand = self.selectors.expand_button,
            original = self.selectors.original_button
        )
    }

    /// Pull every loaded review node into a JSON array in one evaluate.
    pub fn extract_script(&self) -> String {
        format!(
            r#"
            (() => {{
                const records = [];
                document.querySelectorAll('{node}').forEach(review => {{
                    try {{
                        const data = {{}};
                        const withId = review.querySelector('[data-review-id]');
                        data.review_id = withId
                            ? withId.getAttribute('data-review-id') : null;
                        const author = review.querySelector('{author}');
                        data.author = author ? author.textContent.trim() : null;
                        const rating = review.querySelector('{rating}');
                        if (rating) {{
                            const label = rating.getAttribute('aria-label') || '';
                            const m = label.match(/(\d+)/);
                            data.rating = m ? parseInt(m[1], 10) : null;
                        }}
                        const date = review.querySelector('{date}');
                        data.date = date ? date.textContent.trim() : null;
                        const textDiv = review.querySelector('{text_container}');
                        if (textDiv) {{
                            data.language = textDiv.getAttribute('lang');
                            const span = textDiv.querySelector('{text_span}');
                            data.text = span
                                ? span.textContent.trim() : textDiv.textContent.trim();
                        }}
                        if (data.text) {{
                            records.push(data);
                        }}
                    }} catch (e) {{}}
                }});
                return records;
            }})()
            "#,
            node = self.selectors.review_node,
            author = self.selectors.author,
            rating = self.selectors.rating,
            date = self.selectors.date,
            text_container = self.selectors.text_container,
            text_span = self.selectors.text_span
        )
    }

    /// Map one extraction batch into records, feeding the accumulator.
    /// Returns how many records were new.
    pub fn absorb_batch(&self, batch: Value, acc: &mut ReviewAccumulator) -> Result<usize> {
        let raws: Vec<RawReview> = serde_json::from_value(batch)
            .map_err(|e| MagpieError::Execution(format!("Malformed extraction batch: {}", e)))?;

        let mut added = 0;
        for raw in raws {
            let Some(text) = raw.text else { continue };
            // The site's own review id survives re-renders; prefer it as the
            // identity component, fall back to the author display name.
            let author_key = raw
                .review_id
                .clone()
                .or_else(|| raw.author.clone())
                .unwrap_or_default();
            let rating = raw.rating.filter(|r| (1..=5).contains(r));
            let record = ReviewRecord::new(
                &author_key,
                raw.author,
                rating,
                raw.date,
                text,
                raw.language,
            );
            if acc.push(record) {
                added += 1;
            }
        }
        debug!("Absorbed batch: {} new records", added);
        Ok(added)
    }
}

/// Insertion-ordered, fingerprint-deduplicated review set for one target.
/// Set semantics on fingerprint, sequence semantics on order: re-scrolling
/// past a node already seen changes nothing.
#[derive(Debug, Default)]
pub struct ReviewAccumulator {
    seen: HashSet<String>,
    records: Vec<ReviewRecord>,
}

impl ReviewAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the fingerprint is already present. Returns whether the
    /// record was new.
    pub fn push(&mut self, record: ReviewRecord) -> bool {
        if self.seen.contains(&record.fingerprint) {
            return false;
        }
        self.seen.insert(record.fingerprint.clone());
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hand the collected records out, capped to `max` preferring the
    /// earliest-extracted (most-recent-sorted, when sort succeeded).
    pub fn into_records(self, max: Option<usize>) -> Vec<ReviewRecord> {
        let mut records = self.records;
        if let Some(max) = max {
            records.truncate(max);
        }
        records
    }
}
