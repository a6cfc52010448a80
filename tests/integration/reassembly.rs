//! Reassembly under arbitrary capture order.

use rand::seq::SliceRandom;
use rand::Rng;

use flicker_core::frame::{chunk, parse_frame};
use flicker_core::PaymentEnvelope;
use flicker_services::ChunkCollector;

use crate::*;

/// Shuffled frames with random repeats complete exactly once, on the last
/// missing index.
#[test]
fn test_shuffled_with_duplicates() {
    let mut rng = rand::thread_rng();
    let set = chunk(fixture());
    let total = set.len();

    for _ in 0..50 {
        let mut captures: Vec<String> = set.texts();
        for _ in 0..rng.gen_range(0..40) {
            let i = rng.gen_range(0..total);
            captures.push(set.texts()[i].clone());
        }
        captures.shuffle(&mut rng);

        let mut collector = ChunkCollector::new();
        let mut seen = std::collections::HashSet::new();
        let mut completed = Vec::new();
        for text in captures {
            let frame = parse_frame(&text).unwrap();
            seen.insert(frame.index);
            let last_missing = seen.len() == total;
            match collector.add_frame(frame) {
                Some(payload) => {
                    assert!(last_missing);
                    completed.push(payload);
                    break;
                }
                None => {
                    if let Some(p) = collector.progress(&set.session_id) {
                        assert_eq!(p.collected, seen.len());
                    }
                }
            }
        }

        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0], fixture());
        let envelope = PaymentEnvelope::from_base64(&completed[0]).unwrap();
        assert_eq!(envelope.outputs.len(), 1);
    }
}

/// Two transfers interleaved on one collector do not mix.
#[test]
fn test_interleaved_sessions() {
    let a = "A".repeat(400);
    let b = "B".repeat(250);
    let set_a = chunk(&a);
    let set_b = chunk(&b);
    assert_ne!(set_a.session_id, set_b.session_id);

    let mut collector = ChunkCollector::new();
    let mut done = Vec::new();
    let texts_a = set_a.texts();
    let texts_b = set_b.texts();
    for i in 0..texts_a.len().max(texts_b.len()) {
        for texts in [&texts_a, &texts_b] {
            if let Some(text) = texts.get(i) {
                if let Some(payload) = collector.add_frame(parse_frame(text).unwrap()) {
                    done.push(payload);
                }
            }
        }
    }

    assert_eq!(done, vec![b, a]);
    assert!(collector.is_empty());
}
