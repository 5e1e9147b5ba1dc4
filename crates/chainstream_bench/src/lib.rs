//! Benchmark utilities.

use chainstream_core::{Chain, ChainConfig, ChainResult, Stream, TypedStream};
use rand::Rng;

/// Generate `count` random `u64` records.
pub fn random_records(count: usize) -> Vec<u64> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen()).collect()
}

/// Generate `size` random bytes.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Push `records` from a worker thread to a consumer on the calling thread
/// and return the sum the consumer saw.
pub fn pump(records: Vec<u64>, block_size: usize, block_count: usize) -> ChainResult<u64> {
    let mut chain = Chain::new(ChainConfig::for_blocks(8, block_size, block_count))?;
    chain.spawn_fn(move |position| {
        let mut out = TypedStream::<u64>::new(position)?;
        for record in records {
            *out.get_mut() = record;
            out.advance();
        }
        out.poison();
        Ok(())
    })?;
    let mut input = chain.typed_stream::<u64>()?;
    chain.complete_loop()?;

    let mut sum = 0u64;
    while input.is_active() {
        sum = sum.wrapping_add(*input.get());
        input.advance();
    }
    drop(input);
    chain.wait()?;
    Ok(sum)
}

/// Count the entries of a raw stream without touching their bytes.
pub fn count_entries(stream: &mut Stream) -> u64 {
    let mut count = 0;
    while stream.is_active() {
        count += 1;
        stream.advance();
    }
    count
}
