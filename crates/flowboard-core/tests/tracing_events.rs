#![forbid(unsafe_code)]

//! Structured log events emitted by the reconciliation engine.
//!
//! Degraded paths (measurement misses, forced fallbacks) must surface as
//! `WARN` events on the documented targets, while the happy path stays at
//! `DEBUG` or below.
//!
//! Run:
//!   cargo test -p flowboard-core --test tracing_events

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use flowboard_core::reconcile::ReconcilerConfig;
use flowboard_core::{
    BoardSnapshot, Card, CardId, GlideConfig, Lane, LayoutProbe, Rect, Reconciler,
};
use tracing_subscriber::layer::SubscriberExt;
use web_time::Duration;

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    target: String,
    message: String,
    fields: HashMap<String, String>,
}

struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let fields: HashMap<String, String> = visitor.0.into_iter().collect();
        let message = fields.get("message").cloned().unwrap_or_default();
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message,
            fields,
        });
    }
}

fn with_captured_events<F: FnOnce()>(f: F) -> Vec<CapturedEvent> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(EventCapture {
            events: Arc::clone(&events),
        });
    tracing::subscriber::with_default(subscriber, f);
    let captured = events.lock().unwrap().clone();
    captured
}

fn warnings(events: &[CapturedEvent]) -> Vec<&CapturedEvent> {
    events
        .iter()
        .filter(|e| e.level == tracing::Level::WARN)
        .collect()
}

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct Layout {
    generation: u64,
    rects: HashMap<CardId, Rect>,
}

impl Layout {
    fn at(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    fn with(mut self, id: &str, rect: Rect) -> Self {
        self.rects.insert(CardId::from(id), rect);
        self
    }
}

impl LayoutProbe for Layout {
    fn bounding_rect(&self, card: &CardId) -> Option<Rect> {
        self.rects.get(card).copied()
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

fn board(col: u32) -> BoardSnapshot {
    let mut lanes: Vec<Lane> = (0..3)
        .map(|i| Lane::new(format!("lane-{i}"), format!("Lane {i}")))
        .collect();
    lanes[col as usize].cards.push(Card::new("c1", col));
    BoardSnapshot::new(lanes)
}

const A: Rect = Rect::new(0.0, 70.0, 90.0, 30.0);
const B: Rect = Rect::new(126.0, 70.0, 90.0, 30.0);

// ============================================================================
// Tests
// ============================================================================

#[test]
fn happy_path_emits_no_warnings() {
    let events = with_captured_events(|| {
        let mut r = Reconciler::default();
        r.ingest(board(0), &Layout::default());
        r.ingest(board(1), &Layout::at(1).with("c1", A));
        r.on_frame(Duration::ZERO, &Layout::at(2).with("c1", B));
        r.advance(Duration::from_millis(500));
    });
    assert!(warnings(&events).is_empty(), "{events:?}");
    assert!(events.iter().any(|e| e.target == "flowboard.diff"));
    assert!(
        events
            .iter()
            .any(|e| e.target == "flowboard.driver" && e.message == "glide resolved")
    );
}

#[test]
fn missing_start_rect_warns_with_card_id() {
    let events = with_captured_events(|| {
        let mut r = Reconciler::default();
        r.ingest(board(0), &Layout::default());
        r.ingest(board(1), &Layout::at(1));
    });
    let warned = warnings(&events);
    assert!(!warned.is_empty());
    let measure = warned
        .iter()
        .find(|e| e.target == "flowboard.measure")
        .expect("measure warning");
    assert_eq!(measure.fields.get("card_id").map(String::as_str), Some("c1"));
}

#[test]
fn missing_end_rect_warns() {
    let events = with_captured_events(|| {
        let mut r = Reconciler::default();
        r.ingest(board(0), &Layout::default());
        r.ingest(board(1), &Layout::at(1).with("c1", A));
        r.on_frame(Duration::ZERO, &Layout::at(2));
    });
    assert!(
        warnings(&events)
            .iter()
            .any(|e| e.target == "flowboard.measure" && e.message.contains("new position"))
    );
}

#[test]
fn fallback_warns_on_driver_target() {
    let events = with_captured_events(|| {
        let mut r = Reconciler::new(ReconcilerConfig {
            glide: GlideConfig::default().with_duration(Duration::from_secs(5)),
            ..ReconcilerConfig::default()
        });
        r.ingest(board(0), &Layout::default());
        r.ingest(board(1), &Layout::at(1).with("c1", A));
        r.on_frame(Duration::ZERO, &Layout::at(2).with("c1", B));
        r.advance(Duration::from_secs(60));
    });
    let warned = warnings(&events);
    assert_eq!(warned.len(), 1, "{warned:?}");
    assert_eq!(warned[0].target, "flowboard.driver");
    assert!(warned[0].fields.contains_key("elapsed_ms"));
}
