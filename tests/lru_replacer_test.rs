//! Integration tests for the LRU replacer

use std::sync::Arc;
use std::thread;

use strata::buffer::LruReplacer;
use strata::common::FrameId;

fn frame(id: u32) -> FrameId {
    FrameId::new(id)
}

#[test]
fn test_lru_replacer_sample() {
    let replacer = LruReplacer::new(7);

    for id in [1, 2, 3, 4, 5, 6, 1] {
        replacer.unpin(frame(id));
    }
    // Unpinning a tracked frame does not refresh it.
    assert_eq!(replacer.size(), 6);

    assert_eq!(replacer.victim(), Some(frame(1)));
    assert_eq!(replacer.victim(), Some(frame(2)));
    assert_eq!(replacer.victim(), Some(frame(3)));

    replacer.pin(frame(3));
    replacer.pin(frame(4));
    assert_eq!(replacer.size(), 2);

    replacer.unpin(frame(4));
    assert_eq!(replacer.victim(), Some(frame(5)));
    assert_eq!(replacer.victim(), Some(frame(6)));
    assert_eq!(replacer.victim(), Some(frame(4)));
    assert_eq!(replacer.victim(), None);
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_lru_replacer_victims_follow_unpin_order() {
    let replacer = LruReplacer::new(3);
    replacer.unpin(frame(2));
    replacer.unpin(frame(0));
    replacer.unpin(frame(1));

    assert_eq!(replacer.victim(), Some(frame(2)));
    assert_eq!(replacer.victim(), Some(frame(0)));
    assert_eq!(replacer.victim(), Some(frame(1)));
}

#[test]
fn test_lru_replacer_ignores_out_of_range_frames() {
    let replacer = LruReplacer::new(2);
    replacer.unpin(frame(5));
    replacer.pin(frame(5));
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_lru_replacer_concurrent_unpin() {
    let replacer = Arc::new(LruReplacer::new(64));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let replacer = Arc::clone(&replacer);
            thread::spawn(move || {
                for i in 0..16 {
                    replacer.unpin(frame(t * 16 + i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(replacer.size(), 64);
    let mut victims: Vec<_> = std::iter::from_fn(|| replacer.victim())
        .map(|f| f.as_u32())
        .collect();
    victims.sort_unstable();
    assert_eq!(victims, (0..64).collect::<Vec<_>>());
}
