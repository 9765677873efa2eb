//! Frame queue concurrency tests
//!
//! Producer and consumer run on separate threads, as the decode worker and
//! the controller do.

use bigring_vp::playback::{Frame, FrameQueue, QueueError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

fn frame(n: u32) -> Frame {
    Frame::new(n, 2, 2, vec![0; 12])
}

#[test]
fn test_put_blocks_at_capacity_until_take() {
    let queue = Arc::new(FrameQueue::new(3, 1));
    for n in 0..3 {
        queue.put(frame(n)).unwrap();
    }

    let puts_done = Arc::new(AtomicUsize::new(0));
    let producer = {
        let queue = Arc::clone(&queue);
        let puts_done = Arc::clone(&puts_done);
        thread::spawn(move || {
            for n in 3..5 {
                queue.put(frame(n)).unwrap();
                puts_done.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert_eq!(puts_done.load(Ordering::SeqCst), 0, "put must block while full");
    assert_eq!(queue.len(), 3);

    // One take makes room for exactly one frame
    assert_eq!(queue.take().unwrap().frame_number, 0);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(puts_done.load(Ordering::SeqCst), 1);
    assert_eq!(queue.len(), 3);

    assert_eq!(queue.take().unwrap().frame_number, 1);
    producer.join().unwrap();
    assert_eq!(puts_done.load(Ordering::SeqCst), 2);

    let rest: Vec<u32> = (0..3).map(|_| queue.take().unwrap().frame_number).collect();
    assert_eq!(rest, vec![2, 3, 4]);
}

#[test]
fn test_take_blocks_until_put() {
    let queue = Arc::new(FrameQueue::new(4, 2));
    let (tx, rx) = mpsc::channel();

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let frame = queue.take();
            tx.send(frame.map(|f| f.frame_number)).unwrap();
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    queue.put(frame(42)).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), Ok(42));
    consumer.join().unwrap();
}

#[test]
fn test_drain_wakes_blocked_take() {
    let queue = Arc::new(FrameQueue::new(4, 2));
    let (tx, rx) = mpsc::channel();

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            tx.send(queue.take().map(|f| f.frame_number)).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(50));
    queue.drain();
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        Err(QueueError::Drained)
    );
    consumer.join().unwrap();
}

#[test]
fn test_drain_wakes_blocked_put() {
    let queue = Arc::new(FrameQueue::new(1, 0));
    queue.put(frame(0)).unwrap();
    let (tx, rx) = mpsc::channel();

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            tx.send(queue.put(frame(1))).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert_eq!(queue.drain(), 1);
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        Err(QueueError::Drained)
    );
    producer.join().unwrap();
    assert!(queue.is_empty());
}

#[test]
fn test_producer_consumer_preserve_order() {
    let queue = Arc::new(FrameQueue::new(8, 4));
    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for n in 0..500 {
                queue.put(frame(n)).unwrap();
            }
        })
    };

    let received: Vec<u32> = (0..500).map(|_| queue.take().unwrap().frame_number).collect();
    producer.join().unwrap();

    assert!(received.iter().copied().eq(0..500));
    let stats = queue.stats();
    assert_eq!(stats.frames_put, 500);
    assert_eq!(stats.frames_taken, 500);
}

#[test]
fn test_queue_usable_after_drain_across_threads() {
    let queue = Arc::new(FrameQueue::new(2, 1));
    queue.put(frame(1)).unwrap();
    queue.put(frame(2)).unwrap();
    queue.drain();

    // A take right after a drain fails until something is put
    assert_eq!(queue.try_take(), Err(QueueError::Drained));
    let epoch = queue.epoch();
    queue.put_in_epoch(epoch, frame(10)).unwrap();

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for n in 11..14 {
                queue.put_in_epoch(epoch, frame(n)).unwrap();
            }
        })
    };

    let received: Vec<u32> = (0..4).map(|_| queue.take().unwrap().frame_number).collect();
    producer.join().unwrap();
    assert_eq!(received, vec![10, 11, 12, 13]);
}
