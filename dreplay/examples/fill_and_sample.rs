//! Fills a replay buffer on Redis with random transitions and samples from it.
//!
//! ```bash
//! docker run --rm -p 6379:6379 redis
//! cargo run -p dreplay --example fill_and_sample -- --capacity 1000 --n-transitions 5000
//! ```
//!
//! Run several instances against the same `--db` to see producers sharing one buffer.
use anyhow::Result;
use clap::Parser;
use dreplay::{
    Cancellation, DistributedReplayBufferConfig, DistributedReplayConfig, RedisReplayBuffer,
    RedisStoreConfig, Transition,
};
use log::info;
use std::time::{Duration, Instant};

const DIM_OBS: usize = 4;
const N_ACTS: i64 = 2;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML configuration, overrides the endpoint and capacity options
    #[arg(long)]
    config: Option<String>,

    /// Host of the Redis server
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port of the Redis server
    #[arg(long, default_value_t = 6379)]
    port: u16,

    /// Logical database used as the namespace of the buffer
    #[arg(long, default_value_t = 0)]
    db: i64,

    /// Capacity of the buffer, 0 for unbounded
    #[arg(long, default_value_t = 10000)]
    capacity: usize,

    /// Number of transitions to store
    #[arg(long, default_value_t = 1000)]
    n_transitions: usize,

    /// Batch size
    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    /// Timeout of the whole run in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Clear the buffer before storing
    #[arg(long, default_value_t = false)]
    clear: bool,
}

fn config(args: &Args) -> Result<DistributedReplayConfig> {
    match &args.config {
        Some(path) => DistributedReplayConfig::load(path),
        None => Ok(DistributedReplayConfig::default()
            .replay_buffer(DistributedReplayBufferConfig::default().capacity(args.capacity))
            .redis(
                RedisStoreConfig::default()
                    .endpoint(args.host.clone(), args.port)
                    .db(args.db),
            )),
    }
}

fn random_transition() -> Transition<Vec<f32>, i64> {
    let obs = (0..DIM_OBS).map(|_| fastrand::f32()).collect::<Vec<_>>();
    let next_obs = (0..DIM_OBS).map(|_| fastrand::f32()).collect::<Vec<_>>();
    let is_terminated = fastrand::u8(..100) == 0;
    Transition::new(
        obs,
        fastrand::i64(..N_ACTS),
        next_obs,
        fastrand::f32(),
        is_terminated,
        false,
    )
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = config(&args)?;
    let cancel = Cancellation::with_timeout(Duration::from_secs(args.timeout));

    let buffer: RedisReplayBuffer<Vec<f32>, i64> = config.build()?;
    if args.clear {
        buffer.clear(&cancel)?;
    }

    let start = Instant::now();
    for _ in 0..args.n_transitions {
        buffer.store(&random_transition(), &cancel)?;
    }
    info!(
        "Stored {} transitions in {:?}, buffer holds {}",
        args.n_transitions,
        start.elapsed(),
        buffer.len(&cancel)?
    );

    let start = Instant::now();
    let batch = buffer.sample(args.batch_size, &cancel)?;
    let n_done = batch.iter().filter(|tr| tr.is_done()).count();
    info!(
        "Sampled {} transitions ({} terminal) in {:?}",
        batch.len(),
        n_done,
        start.elapsed()
    );

    info!("Mean reward: {}", buffer.mean_reward(&cancel)?);
    Ok(())
}
