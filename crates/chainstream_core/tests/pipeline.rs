//! End-to-end tests running streams across worker threads.

use bytemuck::{Pod, Zeroable};
use chainstream_core::{
    Block, BlockQueue, Chain, ChainConfig, ChainError, ChainPosition, ChainResult, Delivery,
    ReadWorker, Stream, StreamState, TypedStream, WriteAndRecycle, WriteWorker,
};
use proptest::prelude::*;
use std::fs::{self, File};
use std::io::Write;
use std::sync::Arc;

const ENTRY: usize = 8;

fn producer(values: Vec<u64>) -> impl FnOnce(ChainPosition) -> ChainResult<()> + Send + 'static {
    move |position| {
        let mut out = TypedStream::<u64>::new(position)?;
        for value in values {
            // Poison from a failed stage downstream can arrive first.
            if !out.is_active() {
                break;
            }
            *out.get_mut() = value;
            out.advance();
        }
        out.poison();
        Ok(())
    }
}

fn drain(input: &mut TypedStream<u64>) -> Vec<u64> {
    let mut values = Vec::new();
    while input.is_active() {
        values.push(*input.get());
        input.advance();
    }
    values
}

/// Runs `values` through a producer and a main-thread consumer.
fn round_trip(values: &[u64], entries_per_block: usize, block_count: usize) -> Vec<u64> {
    let config = ChainConfig::for_blocks(ENTRY, ENTRY * entries_per_block, block_count);
    let mut chain = Chain::new(config).unwrap();
    chain.spawn_fn(producer(values.to_vec())).unwrap();
    // Bind only after the ring is closed: with a single block, an empty first
    // block can only be skipped once the recycler is running.
    let position = chain.add().unwrap();
    chain.complete_loop().unwrap();
    let mut input = TypedStream::<u64>::new(position).unwrap();

    let seen = drain(&mut input);
    assert_eq!(input.state(), StreamState::Exhausted);
    drop(input);
    chain.wait().unwrap();
    seen
}

#[test]
fn one_entry_per_block() {
    let values: Vec<u64> = (0..17).collect();
    assert_eq!(round_trip(&values, 1, 2), values);
}

#[test]
fn two_entries_per_block() {
    let values: Vec<u64> = (100..117).collect();
    assert_eq!(round_trip(&values, 2, 3), values);
}

#[test]
fn many_entries_per_block() {
    let values: Vec<u64> = (0..1000).map(|i| i * 31).collect();
    assert_eq!(round_trip(&values, 64, 4), values);
}

#[test]
fn single_block_chain() {
    let values: Vec<u64> = (0..9).collect();
    assert_eq!(round_trip(&values, 4, 1), values);
}

#[test]
fn empty_stream() {
    assert!(round_trip(&[], 4, 2).is_empty());
}

#[test]
fn poison_stops_exactly_after_last_entry() {
    // Six entries in blocks of four: the second block is cut at 16 bytes.
    let mut chain = Chain::new(ChainConfig::for_blocks(8, 32, 2)).unwrap();
    chain.spawn_fn(producer((1..=6).collect())).unwrap();
    let mut input = Stream::default();
    chain.attach(&mut input).unwrap();
    chain.complete_loop().unwrap();

    let mut count = 0;
    while input.is_active() {
        count += 1;
        input.advance();
    }
    assert_eq!(count, 6);
    assert!(!input.is_active());
    drop(input);
    chain.wait().unwrap();
}

#[test]
fn poison_freezes_valid_size_of_last_block() {
    // Entry 8, block 32: six entries fill one block and half of the next.
    let input = Arc::new(BlockQueue::new(4));
    let between = Arc::new(BlockQueue::new(5));
    let output = Arc::new(BlockQueue::new(5));
    for _ in 0..3 {
        input.produce(Delivery::Block(Block::new(32)));
    }

    let mut out = Stream::new(ChainPosition::new(input, Arc::clone(&between), 8, 32));
    for i in 1u64..=6 {
        out.get_mut().copy_from_slice(&i.to_le_bytes());
        out.advance();
    }
    out.poison();
    assert_eq!(out.state(), StreamState::Exhausted);

    let mut sizes = Vec::new();
    let mut reader = Stream::new(ChainPosition::new(
        Arc::clone(&between),
        Arc::clone(&output),
        8,
        32,
    ));
    let mut seen = Vec::new();
    while reader.is_active() {
        seen.push(u64::from_le_bytes(reader.get().try_into().unwrap()));
        reader.advance();
    }
    while let Some(delivery) = output.try_consume() {
        sizes.push(match delivery {
            Delivery::Block(block) => Some(block.valid_size()),
            Delivery::Poison => None,
        });
    }

    assert_eq!(seen, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(sizes, vec![Some(32), Some(16), Some(0), None]);
}

#[test]
fn mismatched_typed_stream_does_not_hang_wait() {
    let mut chain = Chain::new(ChainConfig::for_blocks(ENTRY, 32, 2)).unwrap();
    chain.spawn_fn(producer((0..3).collect())).unwrap();
    let position = chain.add().unwrap();

    let err = TypedStream::<u32>::new(position).unwrap_err();
    assert!(matches!(err, ChainError::RecordLayout { .. }));
    chain.wait().unwrap();
}

#[test]
fn in_place_stage_between_producer_and_consumer() {
    let mut chain = Chain::new(ChainConfig::for_blocks(ENTRY, 24, 3)).unwrap();
    chain
        .spawn_fn(producer((0..50).collect()))
        .unwrap()
        .spawn_fn(|position| {
            let mut stage = TypedStream::<u64>::new(position)?;
            while stage.is_active() {
                *stage.get_mut() *= 2;
                stage.advance();
            }
            Ok(())
        })
        .unwrap();
    let mut input = chain.typed_stream::<u64>().unwrap();
    chain.complete_loop().unwrap();

    let expected: Vec<u64> = (0..50).map(|v| v * 2).collect();
    assert_eq!(drain(&mut input), expected);
    drop(input);
    chain.wait().unwrap();
}

#[test]
fn filter_into_second_chain() {
    let mut source = Chain::new(ChainConfig::for_blocks(ENTRY, 32, 2)).unwrap();
    source.spawn_fn(producer((0..40).collect())).unwrap();
    let mut evens_in = source.typed_stream::<u64>().unwrap();
    source.complete_loop().unwrap();

    let mut sink = Chain::new(ChainConfig::for_blocks(ENTRY, 16, 2)).unwrap();
    sink.spawn_fn(move |position| {
        let mut out = TypedStream::<u64>::new(position)?;
        while evens_in.is_active() {
            let value = *evens_in.get();
            if value % 2 == 0 {
                *out.get_mut() = value;
                out.advance();
            }
            evens_in.advance();
        }
        out.poison();
        Ok(())
    })
    .unwrap();
    let mut input = sink.typed_stream::<u64>().unwrap();
    sink.complete_loop().unwrap();

    let expected: Vec<u64> = (0..40).filter(|v| v % 2 == 0).collect();
    assert_eq!(drain(&mut input), expected);
    drop(input);
    sink.wait().unwrap();
    source.wait().unwrap();
}

#[test]
fn consumer_dropped_early_still_finishes() {
    let mut chain = Chain::new(ChainConfig::for_blocks(ENTRY, 16, 2)).unwrap();
    chain
        .spawn_fn(|position| {
            let mut out = TypedStream::<u64>::new(position)?;
            let mut value = 0;
            // Stops when the consumer's poison comes back around the ring.
            while out.is_active() && value < 10_000 {
                *out.get_mut() = value;
                out.advance();
                value += 1;
            }
            out.poison();
            Ok(())
        })
        .unwrap();
    let mut input = chain.typed_stream::<u64>().unwrap();
    chain.complete_loop().unwrap();

    for expected in 0..3 {
        assert_eq!(*input.get(), expected);
        input.advance();
    }
    drop(input);
    chain.wait().unwrap();
}

#[test]
fn failing_worker_does_not_stall_chain() {
    let mut chain = Chain::new(ChainConfig::for_blocks(ENTRY, 16, 2)).unwrap();
    chain.spawn_fn(producer((0..100).collect())).unwrap();
    chain
        .spawn_fn(|position| {
            let mut stage = Stream::new(position);
            stage.advance();
            Err(ChainError::invalid_config("stage gave up"))
        })
        .unwrap();

    let err = chain.wait().unwrap_err();
    assert!(err.to_string().contains("stage gave up"));
}

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Record {
    key: u32,
    weight: f32,
    id: u64,
}

#[test]
fn typed_records_cross_threads() {
    let mut chain = Chain::new(ChainConfig::for_blocks(16, 48, 2)).unwrap();
    chain
        .spawn_fn(|position| {
            let mut out = TypedStream::<Record>::new(position)?;
            for key in 0..7u32 {
                *out.get_mut() = Record {
                    key,
                    weight: key as f32 / 2.0,
                    id: u64::from(key) << 32,
                };
                out.advance();
            }
            out.poison();
            Ok(())
        })
        .unwrap();
    let mut input = chain.typed_stream::<Record>().unwrap();
    chain.complete_loop().unwrap();

    let mut keys = Vec::new();
    while input.is_active() {
        let record = *input.get();
        assert_eq!(record.id, u64::from(record.key) << 32);
        keys.push(record.key);
        input.advance();
    }
    assert_eq!(keys, (0..7).collect::<Vec<_>>());
    drop(input);
    chain.wait().unwrap();
}

#[test]
fn typed_stream_with_wrong_size_is_rejected() {
    let mut chain = Chain::new(ChainConfig::for_blocks(ENTRY, 16, 2)).unwrap();
    let err = chain.typed_stream::<u32>().unwrap_err();
    assert!(matches!(err, ChainError::RecordLayout { .. }));
    // The rejected view did not take a position.
    assert!(!chain.is_running());
}

#[test]
fn file_copy_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.bin");
    let dst = dir.path().join("out.bin");
    let data: Vec<u8> = (0..4096u32).flat_map(u32::to_le_bytes).collect();
    fs::write(&src, &data).unwrap();

    let mut chain = Chain::new(ChainConfig::for_blocks(4, 100, 3)).unwrap();
    chain
        .spawn(ReadWorker::new(File::open(&src).unwrap()))
        .unwrap()
        .spawn(WriteAndRecycle::new(File::create(&dst).unwrap()))
        .unwrap();
    chain.wait().unwrap();

    assert_eq!(fs::read(&dst).unwrap(), data);
}

#[test]
fn file_copy_with_consumer_in_between() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.bin");
    let dst = dir.path().join("out.bin");
    let values: Vec<u64> = (0..300).collect();
    fs::write(&src, bytemuck::cast_slice::<u64, u8>(&values)).unwrap();

    let mut chain = Chain::new(ChainConfig::for_blocks(ENTRY, 64, 2)).unwrap();
    chain
        .spawn(ReadWorker::new(File::open(&src).unwrap()))
        .unwrap()
        .spawn_fn(|position| {
            let mut stage = TypedStream::<u64>::new(position)?;
            while stage.is_active() {
                *stage.get_mut() += 1;
                stage.advance();
            }
            Ok(())
        })
        .unwrap()
        .spawn(WriteWorker::new(File::create(&dst).unwrap()))
        .unwrap();
    chain.wait().unwrap();

    let written = fs::read(&dst).unwrap();
    let copied: Vec<u64> = written
        .chunks_exact(ENTRY)
        .map(bytemuck::pod_read_unaligned)
        .collect();
    assert_eq!(copied, (1..=300).collect::<Vec<u64>>());
}

#[test]
fn trailing_partial_entry_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[7u8; 8 * 5 + 3]).unwrap();
    file.flush().unwrap();

    let mut chain = Chain::new(ChainConfig::for_blocks(ENTRY, 32, 2)).unwrap();
    chain
        .spawn(ReadWorker::new(File::open(file.path()).unwrap()))
        .unwrap()
        .spawn(WriteAndRecycle::new(std::io::sink()))
        .unwrap();

    let err = chain.wait().unwrap_err();
    assert!(matches!(
        err,
        ChainError::PartialEntry {
            got: 11,
            entry_size: 8
        }
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn order_is_preserved(
        values in prop::collection::vec(any::<u64>(), 0..300),
        entries_per_block in 1usize..6,
        block_count in 1usize..4,
    ) {
        prop_assert_eq!(round_trip(&values, entries_per_block, block_count), values);
    }

    #[test]
    fn poison_after_prefix(
        total in 1usize..200,
        cut in 0usize..200,
        entries_per_block in 1usize..5,
    ) {
        let cut = cut.min(total);
        let values: Vec<u64> = (0..total as u64).collect();
        let seen = round_trip(&values[..cut], entries_per_block, 2);
        prop_assert_eq!(seen.as_slice(), &values[..cut]);
    }
}
