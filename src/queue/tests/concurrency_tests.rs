//! Races between concurrent workers, producers and cancellations

use std::collections::HashSet;
use std::time::Duration;

use super::{memory_queue, payload};
use crate::queue::{CancelOutcome, Priority};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dequeue_hands_out_each_job_once() {
    let queue = memory_queue();
    let mut submitted = HashSet::new();
    for i in 0..300 {
        let priority = if i % 2 == 0 { Priority::High } else { Priority::Low };
        submitted.insert(queue.enqueue(priority, payload(60)).await.unwrap());
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            let mut taken = Vec::new();
            while let Some(job) = queue.try_dequeue().await.unwrap() {
                taken.push(job.job_id);
                tokio::task::yield_now().await;
            }
            taken
        }));
    }

    let mut served = Vec::new();
    for handle in handles {
        served.extend(handle.await.unwrap());
    }

    let unique: HashSet<String> = served.iter().cloned().collect();
    assert_eq!(served.len(), submitted.len(), "a job was served twice or lost");
    assert_eq!(unique, submitted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_and_dequeue_never_both_win() {
    for _ in 0..50 {
        let queue = memory_queue();
        let id = queue.enqueue(Priority::Low, payload(60)).await.unwrap();

        let worker = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.try_dequeue().await.unwrap() })
        };
        let canceller = {
            let queue = queue.clone();
            let id = id.clone();
            tokio::spawn(async move { queue.cancel(&id).await.unwrap() })
        };

        let dequeued = worker.await.unwrap();
        let outcome = canceller.await.unwrap();

        match (dequeued, outcome) {
            (Some(job), CancelOutcome::RejectedProcessing) => assert_eq!(job.job_id, id),
            (None, CancelOutcome::Cancelled) => {
                assert!(queue.try_dequeue().await.unwrap().is_none())
            }
            (dequeued, outcome) => panic!(
                "inconsistent race result: dequeued={:?} outcome={:?}",
                dequeued.map(|job| job.job_id),
                outcome
            ),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_producers_and_consumers_drain_everything() {
    let queue = memory_queue();

    let mut producers = Vec::new();
    for p in 0..4 {
        let queue = queue.clone();
        producers.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for i in 0..50 {
                let priority = if (p + i) % 3 == 0 { Priority::High } else { Priority::Low };
                ids.push(queue.enqueue(priority, payload(60)).await.unwrap());
            }
            ids
        }));
    }

    let mut consumers = Vec::new();
    for _ in 0..4 {
        let queue = queue.clone();
        consumers.push(tokio::spawn(async move {
            let mut taken = Vec::new();
            while let Some(job) = queue.dequeue_timeout(Duration::from_millis(300)).await.unwrap() {
                queue.complete(&job.job_id, "ok".to_string()).await.unwrap();
                taken.push(job.job_id);
            }
            taken
        }));
    }

    let mut submitted = HashSet::new();
    for producer in producers {
        submitted.extend(producer.await.unwrap());
    }
    let mut served = Vec::new();
    for consumer in consumers {
        served.extend(consumer.await.unwrap());
    }

    assert_eq!(served.len(), 200);
    assert_eq!(served.into_iter().collect::<HashSet<_>>(), submitted);
    assert_eq!(queue.queue_lengths().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_dequeue_timeout_wakes_for_new_job() {
    let queue = memory_queue().with_poll_interval(Duration::from_secs(10));

    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.dequeue_timeout(Duration::from_secs(5)).await.unwrap() })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let id = queue.enqueue(Priority::Low, payload(60)).await.unwrap();

    let job = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("waiter should be woken by the enqueue")
        .unwrap()
        .expect("job should be handed out");
    assert_eq!(job.job_id, id);
}

#[tokio::test]
async fn test_dequeue_timeout_returns_none_when_idle() {
    let queue = memory_queue();
    let started = std::time::Instant::now();
    assert!(queue
        .dequeue_timeout(Duration::from_millis(100))
        .await
        .unwrap()
        .is_none());
    assert!(started.elapsed() >= Duration::from_millis(100));
}
