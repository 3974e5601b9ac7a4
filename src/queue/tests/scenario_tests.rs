//! Queue scenarios: ordering, cancellation, wait rank and result lifetime

use std::collections::HashSet;
use std::time::Duration;

use super::{memory_queue, payload};
use crate::queue::job::MAX_EXPIRATION;
use crate::queue::{CancelOutcome, JobPayload, Priority, QueueError, WaitRank};

#[tokio::test]
async fn test_enqueue_returns_unique_ids() {
    let queue = memory_queue();
    let mut ids = HashSet::new();
    for i in 0..200 {
        let priority = if i % 3 == 0 { Priority::High } else { Priority::Low };
        let id = queue.enqueue(priority, payload(60)).await.unwrap();
        assert!(ids.insert(id), "job id returned twice");
    }
}

#[tokio::test]
async fn test_enqueue_rejects_invalid_payloads() {
    let queue = memory_queue();

    let empty_language = JobPayload::new("", vec![1], "wav", Duration::from_secs(10));
    assert!(matches!(
        queue.enqueue(Priority::Low, empty_language).await,
        Err(QueueError::InvalidJob(_))
    ));

    let zero_ttl = JobPayload::new("en", vec![1], "wav", Duration::ZERO);
    assert!(matches!(
        queue.enqueue(Priority::High, zero_ttl).await,
        Err(QueueError::InvalidJob(_))
    ));

    assert_eq!(queue.queue_lengths().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_enqueue_rejects_out_of_range_expiration() {
    let queue = memory_queue();

    for secs in [9_000_000_000_000, u64::MAX] {
        assert!(matches!(
            queue.enqueue(Priority::High, payload(secs)).await,
            Err(QueueError::InvalidJob(_))
        ));
    }
    assert_eq!(queue.queue_lengths().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_longest_expiration_cancels_and_completes() {
    let queue = memory_queue();
    let secs = MAX_EXPIRATION.as_secs();
    let cancelled = queue.enqueue(Priority::Low, payload(secs)).await.unwrap();
    let completed = queue.enqueue(Priority::High, payload(secs)).await.unwrap();

    assert_eq!(queue.cancel(&cancelled).await.unwrap(), CancelOutcome::Cancelled);

    let job = queue.try_dequeue().await.unwrap().unwrap();
    assert_eq!(job.job_id, completed);
    let result = queue.complete(&completed, "long lived".to_string()).await.unwrap();
    assert_eq!(
        result.expires_at,
        result.completed_at + chrono::Duration::seconds(secs as i64)
    );
    assert_eq!(queue.fetch(&completed).await.unwrap(), Some("long lived".to_string()));
}

#[tokio::test]
async fn test_high_priority_is_served_first() {
    let queue = memory_queue();
    let a = queue.enqueue(Priority::Low, payload(60)).await.unwrap();
    let b = queue.enqueue(Priority::High, payload(60)).await.unwrap();

    let first = queue.try_dequeue().await.unwrap().expect("B is queued");
    assert_eq!(first.job_id, b);
    let second = queue.try_dequeue().await.unwrap().expect("A is queued");
    assert_eq!(second.job_id, a);
    assert!(queue.try_dequeue().await.unwrap().is_none());
}

#[tokio::test]
async fn test_fifo_within_each_tier() {
    let queue = memory_queue();
    let mut low = Vec::new();
    let mut high = Vec::new();
    for i in 0..6 {
        low.push(queue.enqueue(Priority::Low, payload(60)).await.unwrap());
        if i % 2 == 0 {
            high.push(queue.enqueue(Priority::High, payload(60)).await.unwrap());
        }
    }

    let mut served = Vec::new();
    while let Some(job) = queue.try_dequeue().await.unwrap() {
        served.push(job.job_id);
    }

    let expected: Vec<String> = high.into_iter().chain(low).collect();
    assert_eq!(served, expected);
}

#[tokio::test]
async fn test_dequeued_payload_is_intact() {
    let queue = memory_queue();
    let id = queue.enqueue(Priority::Low, payload(42)).await.unwrap();

    let job = queue.try_dequeue().await.unwrap().unwrap();
    assert_eq!(job.job_id, id);
    assert_eq!(job.priority, Priority::Low);
    assert_eq!(job.payload, payload(42));
}

#[tokio::test]
async fn test_wait_rank_counts_high_tier_for_low_jobs() {
    let queue = memory_queue();
    let low_1 = queue.enqueue(Priority::Low, payload(60)).await.unwrap();
    let low_2 = queue.enqueue(Priority::Low, payload(60)).await.unwrap();
    let high_1 = queue.enqueue(Priority::High, payload(60)).await.unwrap();
    let high_2 = queue.enqueue(Priority::High, payload(60)).await.unwrap();
    let high_3 = queue.enqueue(Priority::High, payload(60)).await.unwrap();

    assert_eq!(queue.wait_rank(&high_1).await.unwrap(), WaitRank::Waiting(0));
    assert_eq!(queue.wait_rank(&high_3).await.unwrap(), WaitRank::Waiting(2));
    assert_eq!(queue.wait_rank(&low_1).await.unwrap(), WaitRank::Waiting(3));
    assert_eq!(queue.wait_rank(&low_2).await.unwrap(), WaitRank::Waiting(4));

    // A claimed job is being worked on and no longer counts for anyone
    let claimed = queue.try_dequeue().await.unwrap().unwrap();
    assert_eq!(claimed.job_id, high_1);
    assert_eq!(queue.wait_rank(&high_1).await.unwrap(), WaitRank::Waiting(0));
    assert_eq!(queue.wait_rank(&high_2).await.unwrap(), WaitRank::Waiting(0));
    assert_eq!(queue.wait_rank(&low_2).await.unwrap(), WaitRank::Waiting(3));

    queue.complete(&high_1, "done".to_string()).await.unwrap();
    assert_eq!(queue.wait_rank(&high_1).await.unwrap(), WaitRank::Resolved);
    assert_eq!(queue.wait_rank("unknown").await.unwrap(), WaitRank::Resolved);
}

#[tokio::test]
async fn test_cancel_outcomes() {
    let queue = memory_queue();
    let queued = queue.enqueue(Priority::Low, payload(60)).await.unwrap();
    let claimed = queue.enqueue(Priority::High, payload(60)).await.unwrap();

    let job = queue.try_dequeue().await.unwrap().unwrap();
    assert_eq!(job.job_id, claimed);

    assert_eq!(queue.cancel(&claimed).await.unwrap(), CancelOutcome::RejectedProcessing);
    assert_eq!(queue.cancel("never-issued").await.unwrap(), CancelOutcome::NotFound);
    assert_eq!(queue.cancel(&queued).await.unwrap(), CancelOutcome::Cancelled);
    // Repeating a successful cancellation is harmless
    assert_eq!(queue.cancel(&queued).await.unwrap(), CancelOutcome::Cancelled);

    // The in-flight job still completes normally
    queue.complete(&claimed, "kept".to_string()).await.unwrap();
    assert_eq!(queue.fetch(&claimed).await.unwrap(), Some("kept".to_string()));
    assert_eq!(queue.cancel(&claimed).await.unwrap(), CancelOutcome::RejectedProcessing);
}

#[tokio::test]
async fn test_cancelled_job_is_never_served() {
    let queue = memory_queue();
    let y = queue.enqueue(Priority::High, payload(60)).await.unwrap();
    let other = queue.enqueue(Priority::Low, payload(60)).await.unwrap();

    assert_eq!(queue.cancel(&y).await.unwrap(), CancelOutcome::Cancelled);
    assert_eq!(queue.wait_rank(&y).await.unwrap(), WaitRank::Resolved);
    assert_eq!(queue.fetch(&y).await.unwrap(), None);
    assert_eq!(queue.wait_rank(&other).await.unwrap(), WaitRank::Waiting(0));

    let job = queue.try_dequeue().await.unwrap().unwrap();
    assert_eq!(job.job_id, other);
    assert!(queue.try_dequeue().await.unwrap().is_none());
}

#[tokio::test]
async fn test_complete_is_only_for_claimed_jobs() {
    let queue = memory_queue();
    let id = queue.enqueue(Priority::Low, payload(60)).await.unwrap();

    assert!(matches!(
        queue.complete(&id, "early".to_string()).await,
        Err(QueueError::NotProcessing(_))
    ));
    assert!(matches!(
        queue.complete("ghost", "text".to_string()).await,
        Err(QueueError::JobNotFound(_))
    ));

    queue.try_dequeue().await.unwrap().unwrap();
    queue.complete(&id, "first".to_string()).await.unwrap();
    assert!(matches!(
        queue.complete(&id, "second".to_string()).await,
        Err(QueueError::NotProcessing(_))
    ));
    assert_eq!(queue.fetch(&id).await.unwrap(), Some("first".to_string()));
}

#[tokio::test]
async fn test_delete_reports_existence_once() {
    let queue = memory_queue();
    let id = queue.enqueue(Priority::High, payload(60)).await.unwrap();
    queue.try_dequeue().await.unwrap().unwrap();
    queue.complete(&id, "text".to_string()).await.unwrap();

    assert!(queue.delete(&id).await.unwrap());
    assert!(!queue.delete(&id).await.unwrap());
    assert!(!queue.delete("never-issued").await.unwrap());
    assert_eq!(queue.fetch(&id).await.unwrap(), None);
    assert_eq!(queue.wait_rank(&id).await.unwrap(), WaitRank::Resolved);
}

#[tokio::test]
async fn test_delete_does_not_touch_pending_jobs() {
    let queue = memory_queue();
    let id = queue.enqueue(Priority::Low, payload(60)).await.unwrap();

    assert!(!queue.delete(&id).await.unwrap());
    assert_eq!(queue.wait_rank(&id).await.unwrap(), WaitRank::Waiting(0));
}

#[tokio::test]
async fn test_result_expires_after_its_ttl() {
    let queue = memory_queue();
    let x = queue.enqueue(Priority::Low, payload(1)).await.unwrap();
    queue.try_dequeue().await.unwrap().unwrap();
    queue.complete(&x, "short lived".to_string()).await.unwrap();

    assert_eq!(queue.fetch(&x).await.unwrap(), Some("short lived".to_string()));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(queue.fetch(&x).await.unwrap(), None);
    assert!(!queue.delete(&x).await.unwrap());
}

#[tokio::test]
async fn test_purge_expired_sweeps_results() {
    let queue = memory_queue();
    let short = queue.enqueue(Priority::High, payload(1)).await.unwrap();
    let long = queue.enqueue(Priority::High, payload(600)).await.unwrap();
    for id in [&short, &long] {
        queue.try_dequeue().await.unwrap().unwrap();
        queue.complete(id, "text".to_string()).await.unwrap();
    }

    assert_eq!(queue.purge_expired().await.unwrap(), 0);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(queue.purge_expired().await.unwrap(), 1);

    assert_eq!(queue.fetch(&short).await.unwrap(), None);
    assert_eq!(queue.fetch(&long).await.unwrap(), Some("text".to_string()));
}

#[tokio::test]
async fn test_enqueue_batch_preserves_order() {
    let queue = memory_queue();
    let ids = queue
        .enqueue_batch(Priority::Low, vec![payload(60), payload(60), payload(60)])
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);

    for (rank, id) in ids.iter().enumerate() {
        assert_eq!(queue.wait_rank(id).await.unwrap(), WaitRank::Waiting(rank));
    }
}
