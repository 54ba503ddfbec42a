//! Integration tests for pool lifecycle: add, inclusion, windows, cleanup.

use roundtable_crypto::Keypair;
use roundtable_pool::MessagePool;
use roundtable_types::{now_ms, Message};

fn keypair() -> Keypair {
    Keypair::from_seed(&[1u8; 32])
}

fn message(content: &str, ts: u64) -> Message {
    Message::create_at(content.into(), "alice".into(), ts, &keypair())
}

#[test]
fn test_add_is_idempotent() {
    let mut pool = MessagePool::new();
    let msg = message("hi", 1000);

    pool.add(msg.clone());
    pool.add(msg.clone());

    assert_eq!(pool.len(), 1);
    assert_eq!(pool.pending_count(), 1);
    assert!(pool.has(&msg.message_id));
    assert_eq!(pool.get(&msg.message_id), Some(&msg));
}

#[test]
fn test_mark_included_removes_from_pending() {
    let mut pool = MessagePool::new();
    let a = message("a", 1000);
    let b = message("b", 1001);
    pool.add(a.clone());
    pool.add(b.clone());

    pool.mark_included(&a.message_id);

    assert_eq!(pool.pending_count(), 1);
    assert!(pool.is_included(&a.message_id));
    assert!(!pool.is_included(&b.message_id));
    let pending = pool.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].message_id, b.message_id);

    // Marking twice changes nothing.
    pool.mark_included(&a.message_id);
    assert_eq!(pool.pending_count(), 1);
}

#[test]
fn test_pending_is_ordered_by_seen_at() {
    let mut pool = MessagePool::new();
    let late = message("late", 3000);
    let early = message("early", 1000);
    let mid = message("mid", 2000);

    pool.add_at(late.clone(), 3000);
    pool.add_at(early.clone(), 1000);
    pool.add_at(mid.clone(), 2000);

    let order: Vec<&str> = pool.pending().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(order, vec!["early", "mid", "late"]);
}

#[test]
fn test_messages_in_time_range_inclusive() {
    let mut pool = MessagePool::new();
    for (content, seen) in [("a", 1000u64), ("b", 2000), ("c", 3000), ("d", 4000)] {
        pool.add_at(message(content, seen), seen);
    }

    let in_range: Vec<&str> = pool
        .messages_in_time_range(2000, 3000)
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(in_range, vec!["b", "c"]);
}

#[test]
fn test_find_missing_excludes_committed() {
    let mut pool = MessagePool::new();
    let committed = message("committed", 1000);
    let lost = message("lost", 1001);
    pool.add_at(committed.clone(), 1000);
    pool.add_at(lost.clone(), 1001);
    pool.mark_included(&committed.message_id);

    let missing = pool.find_missing(0, 5000);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].message_id, lost.message_id);
}

#[test]
fn test_cleanup_evicts_old_entries_only() {
    let mut pool = MessagePool::new();
    let now = now_ms();
    let stale = message("stale", 1);
    let fresh = message("fresh", 2);
    pool.add_at(stale.clone(), now.saturating_sub(10_000));
    pool.add_at(fresh.clone(), now);

    let evicted = pool.cleanup(5_000);

    assert_eq!(evicted, 1);
    assert!(!pool.has(&stale.message_id));
    assert!(pool.has(&fresh.message_id));
}

#[test]
fn test_cleanup_evicts_regardless_of_inclusion_but_keeps_the_mark() {
    let mut pool = MessagePool::new();
    let now = now_ms();
    let old = message("old", 1);
    pool.add_at(old.clone(), now.saturating_sub(10_000));
    pool.mark_included(&old.message_id);

    assert_eq!(pool.cleanup(5_000), 1);
    assert!(!pool.has(&old.message_id));

    // A late duplicate delivery must not resurface as pending.
    pool.add(old.clone());
    assert!(pool.has(&old.message_id));
    assert_eq!(pool.pending_count(), 0);
}

#[test]
fn test_stats() {
    let mut pool = MessagePool::new();
    let a = message("a", 1000);
    let b = message("b", 1001);
    pool.add(a.clone());
    pool.add(b);
    pool.mark_included(&a.message_id);

    let stats = pool.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.included, 1);
}
