//! End-to-end behaviour of the three rendering strategies.

use std::time::Duration;

use futures::channel::mpsc;
use futures::StreamExt;
use ssr_core::{RenderConfig, RenderError, RenderMode, SlotId, TimingContext};
use ssr_executor::{RenderSession, SessionReport};
use ssr_streaming::patch::{apply_patches, WireChunk};
use ssr_streaming::{ComponentNode, Element, StreamingSink};
use tokio::time::Instant;

const WORDS: [&str; 5] = ["Hello", "from", "the", "other", "side"];

/// Tree with one async text per delay; `fail` makes that index reject.
fn app(delays_ms: &[u64], fail: Option<usize>) -> ComponentNode {
    let texts = delays_ms.iter().enumerate().map(|(i, &ms)| {
        let word = WORDS[i % WORDS.len()];
        ComponentNode::suspense(format!("<p>Waiting for {}</p>", i + 1), async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            if fail == Some(i) {
                anyhow::bail!("text {} unavailable", i + 1);
            }
            Ok(format!("<p>{}</p>", word))
        })
    });

    Element::new("body")
        .child(Element::new("h1").child(ComponentNode::text("Streaming")))
        .children(texts)
        .child(ComponentNode::markup("<p>This content comes after all the async texts</p>"))
        .into()
}

struct Timed {
    at: Duration,
    chunk: WireChunk,
}

/// Run a session on its own task and record when each chunk arrives.
async fn run_streamed(
    tree: ComponentNode,
    config: RenderConfig,
) -> (Result<SessionReport, RenderError>, Vec<Timed>) {
    let (tx, mut rx) = mpsc::channel(16);
    let start = Instant::now();
    let session = RenderSession::new(config);
    let task = tokio::spawn(session.stream(tree, StreamingSink::new(tx, TimingContext::new())));

    let mut chunks = Vec::new();
    while let Some(bytes) = rx.next().await {
        chunks.push(Timed {
            at: start.elapsed(),
            chunk: WireChunk::classify(&String::from_utf8(bytes).unwrap()),
        });
    }
    (task.await.unwrap(), chunks)
}

fn assert_near(actual: Duration, expected_ms: u64) {
    let expected = Duration::from_millis(expected_ms);
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(50),
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}

#[tokio::test(start_paused = true)]
async fn incremental_writes_shell_first_then_patches_as_they_settle() {
    let (result, chunks) =
        run_streamed(app(&[1000, 2000, 3000, 4000, 5000], None), RenderConfig::default()).await;
    let report = result.unwrap();

    assert_eq!(chunks.len(), 7);
    assert!(matches!(chunks[0].chunk, WireChunk::Shell(_)));
    assert_near(chunks[0].at, 0);

    for (i, timed) in chunks[1..6].iter().enumerate() {
        assert_eq!(timed.chunk.slot(), Some(SlotId(i as u32)));
        assert_near(timed.at, 1000 * (i as u64 + 1));
    }

    assert_eq!(chunks[6].chunk, WireChunk::Terminator);
    assert_eq!(report.patch_order, (0..5).map(SlotId).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn incremental_patches_follow_settlement_not_source_order() {
    let (result, chunks) =
        run_streamed(app(&[5000, 1000, 4000, 2000, 3000], None), RenderConfig::default()).await;
    let report = result.unwrap();

    let order: Vec<SlotId> = chunks.iter().filter_map(|c| c.chunk.slot()).collect();
    assert_eq!(order, vec![SlotId(1), SlotId(3), SlotId(4), SlotId(2), SlotId(0)]);
    assert_eq!(report.patch_order, order);
}

#[tokio::test(start_paused = true)]
async fn every_slot_patched_exactly_once_between_shell_and_terminator() {
    let mut seed: u64 = 0x2545_f491;
    for round in 0..20 {
        let count = 1 + round % 7;
        let delays: Vec<u64> = (0..count)
            .map(|_| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (seed >> 33) % 50
            })
            .collect();

        let (result, chunks) = run_streamed(app(&delays, None), RenderConfig::default()).await;
        result.unwrap();

        assert!(matches!(chunks.first().unwrap().chunk, WireChunk::Shell(_)));
        assert_eq!(chunks.last().unwrap().chunk, WireChunk::Terminator);

        let mut slots: Vec<SlotId> = chunks[1..chunks.len() - 1]
            .iter()
            .map(|c| c.chunk.slot().expect("only patches between shell and terminator"))
            .collect();
        slots.sort();
        assert_eq!(slots, (0..count as u32).map(SlotId).collect::<Vec<_>>());
    }
}

#[tokio::test(start_paused = true)]
async fn buffered_writes_nothing_until_all_settled() {
    let (result, chunks) = run_streamed(
        app(&[1000, 2000, 3000, 4000, 5000], None),
        RenderConfig::new(RenderMode::Buffered),
    )
    .await;
    result.unwrap();

    assert_eq!(chunks.len(), 1);
    assert_near(chunks[0].at, 5000);
    match &chunks[0].chunk {
        WireChunk::Shell(html) => {
            assert!(html.starts_with("<!DOCTYPE html><body>"));
            assert!(html.contains("<p>Hello</p><p>from</p><p>the</p><p>other</p><p>side</p>"));
            assert!(!html.contains("data-slot"));
        }
        other => panic!("expected a single document, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn eager_does_not_return_before_last_slot() {
    let start = Instant::now();
    let html = RenderSession::new(RenderConfig::new(RenderMode::Eager))
        .render_to_string(app(&[1000, 2000, 3000, 4000, 5000], None))
        .await
        .unwrap();

    assert_near(start.elapsed(), 5000);
    assert!(html.contains("<p>side</p><p>This content comes after all the async texts</p>"));
}

#[tokio::test(start_paused = true)]
async fn eager_output_matches_incremental_after_patches() {
    let delays = [300, 100, 500, 200, 400];
    let eager = RenderSession::new(RenderConfig::new(RenderMode::Eager))
        .render_to_string(app(&delays, Some(2)))
        .await
        .unwrap();

    let (result, chunks) = run_streamed(app(&delays, Some(2)), RenderConfig::default()).await;
    result.unwrap();

    let mut shell = String::new();
    let mut patches = Vec::new();
    for timed in chunks {
        match timed.chunk {
            WireChunk::Shell(html) => shell = html,
            WireChunk::Patch { slot, markup } => patches.push((slot, markup)),
            WireChunk::Terminator => {}
        }
    }
    assert_eq!(apply_patches(&shell, &patches), eager);
}

#[tokio::test(start_paused = true)]
async fn one_failing_slot_still_yields_five_patches() {
    let (result, chunks) = run_streamed(
        app(&[1000, 2000, 3000, 4000, 5000], Some(3)),
        RenderConfig::default().with_error_markup("<p class=\"error\">gone</p>"),
    )
    .await;
    let report = result.unwrap();

    let patches: Vec<(SlotId, String)> = chunks
        .into_iter()
        .filter_map(|c| match c.chunk {
            WireChunk::Patch { slot, markup } => Some((slot, markup)),
            _ => None,
        })
        .collect();
    assert_eq!(patches.len(), 5);
    assert_eq!(patches[3], (SlotId(3), "<p class=\"error\">gone</p>".to_string()));
    assert_eq!(patches[4], (SlotId(4), "<p>side</p>".to_string()));
    assert_eq!(report.resolved, 4);
    assert_eq!(report.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn aborted_session_never_patches_unsettled_slots() {
    let (tx, mut rx) = mpsc::channel(16);
    let session = RenderSession::new(RenderConfig::default());
    let abort = session.abort_handle();
    let task = tokio::spawn(session.stream(
        app(&[1000, 2000, 3000, 4000, 5000], None),
        StreamingSink::new(tx, TimingContext::new()),
    ));

    let mut seen = Vec::new();
    while let Some(bytes) = rx.next().await {
        let chunk = WireChunk::classify(&String::from_utf8(bytes).unwrap());
        if chunk.slot() == Some(SlotId(1)) {
            abort.abort();
        }
        seen.push(chunk);
    }

    assert!(matches!(task.await.unwrap(), Err(RenderError::Aborted)));
    let patched: Vec<SlotId> = seen.iter().filter_map(WireChunk::slot).collect();
    assert_eq!(patched, vec![SlotId(0), SlotId(1)]);
    assert!(!seen.contains(&WireChunk::Terminator));
}

#[tokio::test]
async fn malformed_tree_fails_before_any_write() {
    let tree = ComponentNode::fragment([
        ComponentNode::suspense("a", async { Ok(String::new()) }),
        Element::new("").into(),
    ]);
    let (result, chunks) = run_streamed(tree, RenderConfig::default()).await;

    assert!(matches!(result, Err(RenderError::MalformedTree(_))));
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn static_tree_renders_identically_twice() {
    let build = || -> ComponentNode {
        Element::new("p").child(ComponentNode::text("same")).into()
    };
    let first = RenderSession::new(RenderConfig::default())
        .render_to_string(build())
        .await
        .unwrap();
    let second = RenderSession::new(RenderConfig::default())
        .render_to_string(build())
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "<!DOCTYPE html><p>same</p>");
}
