use dreplay_core::{
    Cancellation, DistributedReplayBuffer, DistributedReplayBufferConfig, InMemoryStore,
    ReplayBufferError, Transition,
};
use log::info;
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use test_log::test;

type Buffer = DistributedReplayBuffer<Vec<f32>, usize, Arc<InMemoryStore>>;

const CAPACITY: usize = 100;
const N_PRODUCERS: usize = 4;
const N_STEPS_PER_PRODUCER: usize = 250;
const N_CONSUMERS: usize = 2;
const BATCH_SIZE: usize = 8;

fn transition(producer: usize, step: usize) -> Transition<Vec<f32>, usize> {
    Transition::new(
        vec![step as f32; 4],
        producer,
        vec![step as f32 + 1.0; 4],
        1.0,
        false,
        false,
    )
}

#[test]
fn test_producers_and_consumers_share_one_store() {
    let store = Arc::new(InMemoryStore::new());
    let config = DistributedReplayBufferConfig::default()
        .capacity(CAPACITY)
        .max_draws_per_item(0);

    // Each worker owns its own buffer handle on the shared store
    let producers = (0..N_PRODUCERS)
        .map(|id| {
            let buffer = Buffer::build(&config, store.clone()).unwrap();
            thread::spawn(move || {
                let cancel = Cancellation::new();
                for step in 0..N_STEPS_PER_PRODUCER {
                    buffer.store(&transition(id, step), &cancel)?;
                }
                Ok::<_, ReplayBufferError>(())
            })
        })
        .collect::<Vec<_>>();

    let consumers = (0..N_CONSUMERS)
        .map(|_| {
            let buffer = Buffer::build(&config, store.clone()).unwrap();
            thread::spawn(move || {
                let cancel = Cancellation::with_timeout(Duration::from_secs(30));
                let mut n_batches = 0;
                for _ in 0..50 {
                    let batch = buffer.sample(BATCH_SIZE, &cancel)?;
                    assert_eq!(batch.len(), BATCH_SIZE);
                    assert!(batch.iter().all(|tr| tr.act < N_PRODUCERS));
                    n_batches += 1;
                }
                Ok::<_, ReplayBufferError>(n_batches)
            })
        })
        .collect::<Vec<_>>();

    for p in producers {
        p.join().unwrap().unwrap();
    }
    for c in consumers {
        assert_eq!(c.join().unwrap().unwrap(), 50);
    }

    let cancel = Cancellation::new();
    let buffer = Buffer::build(&config, store).unwrap();
    let len = buffer.len(&cancel).unwrap();
    info!("{} transitions left after all producers finished", len);
    assert!(len <= CAPACITY);
    assert!(len > 0);
    assert_eq!(buffer.mean_reward(&cancel).unwrap(), 1.0);
}

#[test]
fn test_cancel_from_another_thread() {
    let config = DistributedReplayBufferConfig::default().max_draws_per_item(0);
    let buffer = Arc::new(Buffer::build(&config, Arc::new(InMemoryStore::new())).unwrap());
    let cancel = Cancellation::new();

    let learner = {
        let buffer = buffer.clone();
        let cancel = cancel.clone();
        thread::spawn(move || {
            let start = Instant::now();
            let res = buffer.sample(BATCH_SIZE, &cancel);
            (res, start.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(50));
    cancel.cancel();
    let (res, elapsed) = learner.join().unwrap();
    assert_eq!(res.unwrap_err(), ReplayBufferError::Cancelled);
    assert!(elapsed >= Duration::from_millis(50));
}

#[test]
fn test_sample_waits_for_producer() {
    let config = DistributedReplayBufferConfig::default().max_draws_per_item(0);
    let store = Arc::new(InMemoryStore::new());
    let learner = Buffer::build(&config, store.clone()).unwrap();
    let actor = Buffer::build(&config, store).unwrap();

    let handle = thread::spawn(move || {
        let cancel = Cancellation::new();
        thread::sleep(Duration::from_millis(20));
        for step in 0..BATCH_SIZE {
            actor.store(&transition(0, step), &cancel)?;
        }
        Ok::<_, ReplayBufferError>(())
    });

    let cancel = Cancellation::with_timeout(Duration::from_secs(30));
    let batch = learner.sample(BATCH_SIZE, &cancel).unwrap();
    handle.join().unwrap().unwrap();

    let mut steps = batch.iter().map(|tr| tr.obs[0] as usize).collect::<Vec<_>>();
    steps.sort();
    assert_eq!(steps, (0..BATCH_SIZE).collect::<Vec<_>>());
}
