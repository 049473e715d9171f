//! End-to-end scenarios across the whole port surface: role threads driving
//! mailboxes and semaphores through one injected context.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use stackport::sync::thread_sem;
use stackport::{Port, PortConfig, ThreadRole, Ticks, WaitError};

fn port() -> Arc<Port> {
    common::init();
    Arc::new(Port::new(PortConfig::default()).expect("port"))
}

/// The stack's I/O thread drains its message mailbox in post order.
#[test]
fn tcpip_thread_drains_mailbox_in_order() {
    let port = port();
    let mbox = port.create_mailbox::<u32>(8).expect("mailbox");

    const SHUTDOWN: u32 = u32::MAX;
    let consumer = mbox.clone();
    let drained: Arc<StdMutex<Vec<u32>>> = Arc::new(StdMutex::new(Vec::new()));
    let sink = Arc::clone(&drained);

    let handle = port
        .spawn(ThreadRole::TcpIp, 256 * 1024, 5, move || loop {
            match consumer.fetch(Ticks::new(2_000)) {
                Ok((SHUTDOWN, _)) | Err(_) => break,
                Ok((msg, _)) => sink.lock().expect("sink").push(msg),
            }
        })
        .expect("spawn tcpip thread");

    for i in 0..200 {
        mbox.post(i);
    }
    mbox.post(SHUTDOWN);
    handle.join().expect("tcpip thread panicked");

    let drained = drained.lock().expect("sink");
    let expected: Vec<u32> = (0..200).collect();
    assert_eq!(*drained, expected);
}

/// The per-thread semaphore registry binds one semaphore per role thread.
#[test]
fn netconn_semaphore_lives_with_its_thread() {
    let port = port();
    let worker_port = Arc::clone(&port);

    let handle = port
        .spawn(ThreadRole::Snmp, 64 * 1024, 4, move || {
            assert!(thread_sem::get_current().is_none());

            thread_sem::alloc_for_current(&worker_port).expect("alloc");
            let first = thread_sem::get_current().expect("bound");
            thread_sem::alloc_for_current(&worker_port).expect("realloc");
            let second = thread_sem::get_current().expect("bound");
            assert!(first.is_same(&second), "registry handed out a new instance");

            // Nothing signals it; the wait must time out, not hang.
            assert_eq!(first.wait(Ticks::new(20)), Err(WaitError::TimedOut));
            thread_sem::free_for_current();
            assert!(thread_sem::get_current().is_none());
        })
        .expect("spawn snmp thread");

    handle.join().expect("snmp thread panicked");
    // The spawning thread never observed a binding of its own.
    assert!(thread_sem::get_current().is_none());
}

/// Read-modify-write under the protection lock never loses an update even
/// with a deliberate preemption window in the middle.
#[test]
fn protection_serializes_unrelated_threads() {
    let port = port();
    let counter = Arc::new(AtomicU32::new(0));

    let mut workers = Vec::new();
    for _ in 0..4 {
        let port = Arc::clone(&port);
        let counter = Arc::clone(&counter);
        workers.push(std::thread::spawn(move || {
            for _ in 0..25 {
                let token = port.protect();
                let seen = counter.load(Ordering::SeqCst);
                std::thread::yield_now();
                counter.store(seen + 1, Ordering::SeqCst);
                port.unprotect(token);
            }
        }));
    }
    for worker in workers {
        worker.join().expect("worker panicked");
    }
    assert_eq!(counter.load(Ordering::SeqCst), 100);
}

/// A signal posted mid-wait wakes the waiter near the signal, not at the
/// timeout horizon.
#[test]
fn semaphore_wakes_at_signal_not_timeout() {
    let port = port();
    let sem = port.create_semaphore(0).expect("sem");

    let signaler = sem.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(10));
        signaler.signal();
    });

    let start = Instant::now();
    let elapsed = sem.wait(Ticks::new(500)).expect("wait");
    assert!(
        start.elapsed() < Duration::from_millis(400),
        "waited to the timeout horizon: {:?}",
        start.elapsed()
    );
    assert!(
        elapsed.get() < 400,
        "reported elapsed span near the timeout: {elapsed}"
    );
    handle.join().expect("signaler panicked");
}

/// Both role threads coexist; respawning an occupied role fails loudly.
#[test]
fn role_table_is_one_context_per_role() {
    let port = port();
    let io = port
        .spawn(ThreadRole::TcpIp, 64 * 1024, 5, || {})
        .expect("tcpip");
    let agent = port
        .spawn(ThreadRole::Snmp, 64 * 1024, 4, || {})
        .expect("snmp");

    assert!(port.spawn(ThreadRole::TcpIp, 64 * 1024, 5, || {}).is_err());

    io.join().expect("tcpip panicked");
    agent.join().expect("snmp panicked");
}
