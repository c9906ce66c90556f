// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine pool behaviour under contention, failure, and shutdown.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::FakeFactory;
use docwerk_core::error::DocwerkError;
use docwerk_engine::EnginePool;

const SHORT: Duration = Duration::from_millis(50);

#[test]
fn third_acquirer_gets_temporary_handle_and_pool_stays_bounded() {
    let (factory, probe) = FakeFactory::new();
    let pool = EnginePool::new(factory, 2);

    let first = pool.acquire(SHORT).expect("first");
    let second = pool.acquire(SHORT).expect("second");
    assert!(first.is_pooled());
    assert!(second.is_pooled());

    let third = pool.acquire(SHORT).expect("third");
    assert!(!third.is_pooled());

    let stats = pool.stats();
    assert_eq!(stats.checked_out, 2);
    assert_eq!(stats.temporary_out, 1);
    assert_eq!(stats.live, 2);

    drop(third);
    assert_eq!(probe.shut_down.load(Ordering::SeqCst), 1);
    drop(first);
    drop(second);

    let stats = pool.stats();
    assert_eq!(stats.idle, 2);
    assert!(stats.idle <= stats.capacity);
    assert_eq!(stats.temporary_out, 0);
    assert_eq!(probe.created.load(Ordering::SeqCst), 3);
}

#[test]
fn waiting_acquirer_receives_released_handle() {
    let (factory, _probe) = FakeFactory::new();
    let pool = EnginePool::new(factory, 1);
    let (held_tx, held_rx) = std::sync::mpsc::channel();

    std::thread::scope(|scope| {
        let holder = scope.spawn(|| {
            let lease = pool.acquire(SHORT).expect("holder lease");
            let id = lease.handle_id();
            held_tx.send(()).expect("signal");
            std::thread::sleep(Duration::from_millis(100));
            drop(lease);
            id
        });

        held_rx.recv().expect("holder ready");
        let waiter = pool.acquire(Duration::from_secs(5)).expect("waiter lease");
        let held_id = holder.join().expect("holder thread");

        assert!(waiter.is_pooled());
        assert_eq!(waiter.handle_id(), held_id);
    });

    assert_eq!(pool.stats().idle, 1);
}

#[test]
fn released_handles_have_no_open_documents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("a.doc");
    std::fs::write(&input, b"x").expect("write");

    let (factory, _probe) = FakeFactory::new();
    let pool = EnginePool::new(factory, 1);
    {
        let mut lease = pool.acquire(SHORT).expect("lease");
        lease.engine().open_read_only(&input).expect("open");
        lease.engine().open_read_only(&input).expect("open");
        assert_eq!(lease.engine().open_document_count(), 2);
    }

    let mut lease = pool.acquire(SHORT).expect("lease");
    assert_eq!(lease.engine().open_document_count(), 0);
}

#[test]
fn handle_that_keeps_documents_open_is_discarded() {
    let (factory, probe) = FakeFactory::new();
    let pool = EnginePool::new(factory, 2);
    probe.leak_documents.store(true, Ordering::SeqCst);

    pool.acquire(SHORT).expect("lease").release();

    let stats = pool.stats();
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.live, 0);
    assert_eq!(probe.shut_down.load(Ordering::SeqCst), 1);
}

#[test]
fn unresponsive_idle_handle_is_replaced() {
    let (factory, probe) = FakeFactory::new();
    let pool = EnginePool::new(factory, 1);
    assert_eq!(pool.warm_up(), 1);

    probe.unresponsive.store(true, Ordering::SeqCst);
    let lease = pool.acquire(SHORT).expect("lease");
    assert!(lease.is_pooled());
    assert_eq!(probe.created.load(Ordering::SeqCst), 2);
    assert_eq!(probe.shut_down.load(Ordering::SeqCst), 1);
    drop(lease);

    assert_eq!(pool.stats().live, 1);
}

#[test]
fn engine_start_failure_is_unavailable() {
    let (factory, probe) = FakeFactory::new();
    let pool = EnginePool::new(factory, 2);
    probe.refuse.store(true, Ordering::SeqCst);

    let result = pool.acquire(SHORT);
    assert!(matches!(result, Err(DocwerkError::EngineUnavailable(_))));
    let stats = pool.stats();
    assert_eq!(stats.live, 0);
    assert_eq!(stats.checked_out, 0);

    probe.refuse.store(false, Ordering::SeqCst);
    assert!(pool.acquire(SHORT).expect("recovered").is_pooled());
}

#[test]
fn close_is_idempotent_and_refuses_new_work() {
    let (factory, probe) = FakeFactory::new();
    let pool = EnginePool::new(factory, 2);
    pool.warm_up();
    let outstanding = pool.acquire(SHORT).expect("lease");

    pool.close();
    pool.close();
    assert!(pool.stats().closed);
    assert_eq!(probe.shut_down.load(Ordering::SeqCst), 1);
    assert!(matches!(pool.acquire(SHORT), Err(DocwerkError::PoolClosed)));

    drop(outstanding);
    assert_eq!(probe.shut_down.load(Ordering::SeqCst), 2);
    assert_eq!(pool.stats().idle, 0);
}

#[test]
fn unbounded_timeout_does_not_overflow() {
    let (factory, _probe) = FakeFactory::new();
    let pool = EnginePool::new(factory, 1);
    let lease = pool.acquire(Duration::MAX).expect("lease");
    assert!(lease.is_pooled());
}
