//! The async text page rendered by the server render demo.

use std::time::Duration;

use anyhow::anyhow;
use rand::Rng;
use ssr_streaming::{escape_html, ComponentNode, Document, Element, HeadContent};

/// Texts resolved by the async boundaries, in document order.
pub const TEXTS: [&str; 5] = ["✅ Hello", "✅ from", "✅ the", "✅ other", "✅ side"];

/// Page title.
pub const TITLE: &str = "Hello, React App";

/// Closing paragraph after the async texts.
pub const TRAILER: &str = "This content comes after all the async texts";

/// Whether `n` names one of the async texts (1-based).
pub fn is_text_index(n: usize) -> bool {
    (1..=TEXTS.len()).contains(&n)
}

/// One random delay per async text, drawn from `[min_ms, max_ms)`.
pub fn random_delays(min_ms: u64, max_ms: u64) -> Vec<Duration> {
    let mut rng = rand::thread_rng();
    TEXTS
        .iter()
        .map(|_| {
            let ms = if max_ms > min_ms {
                rng.gen_range(min_ms..max_ms)
            } else {
                min_ms
            };
            Duration::from_millis(ms)
        })
        .collect()
}

/// Fallback shown while text `n` (1-based) is pending.
pub fn fallback(n: usize) -> String {
    format!("<p>⏳️ Waiting for promise {} to resolve…</p>", n)
}

/// Build the page. Text `n` resolves after `delays[n - 1]`; the text at
/// `fail` (1-based) rejects instead.
pub fn build(delays: &[Duration], fail: Option<usize>) -> ComponentNode {
    let mut doc = Document::new(HeadContent::new(TITLE));

    for (i, (text, delay)) in TEXTS.into_iter().zip(delays.iter().copied()).enumerate() {
        let n = i + 1;
        let rejects = fail == Some(n);
        doc = doc.child(ComponentNode::suspense(fallback(n), async move {
            tokio::time::sleep(delay).await;
            if rejects {
                return Err(anyhow!("promise {} rejected", n));
            }
            Ok(format!("<p>{}</p>", escape_html(text)))
        }));
    }

    doc.child(Element::new("p").child(ComponentNode::text(TRAILER)))
        .into_node()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_delays_stay_in_range() {
        for _ in 0..100 {
            let delays = random_delays(1000, 5000);
            assert_eq!(delays.len(), TEXTS.len());
            assert!(delays
                .iter()
                .all(|d| *d >= Duration::from_millis(1000) && *d < Duration::from_millis(5000)));
        }
    }

    #[test]
    fn test_empty_range_uses_lower_bound() {
        assert!(random_delays(7, 7)
            .iter()
            .all(|d| *d == Duration::from_millis(7)));
    }

    #[test]
    fn test_text_index_bounds() {
        assert!(!is_text_index(0));
        assert!(is_text_index(1));
        assert!(is_text_index(5));
        assert!(!is_text_index(6));
    }

    #[test]
    fn test_page_has_five_boundaries() {
        let page = build(&random_delays(1, 2), None);
        assert_eq!(page.count_async(), 5);
    }
}
