//! Block storage seam.
//!
//! A clip never touches sample memory directly; it owns one
//! [`SampleSequence`] produced by the track's [`StorageFactory`]. Every
//! mutating call is all-or-nothing at the sequence level except
//! [`SampleSequence::append`], which may keep a prefix of its input.

mod memory;

use std::any::Any;
use std::fmt::Debug;

use crate::error::StorageError;
use crate::format::SampleFormat;

pub use memory::{MemorySequence, MemoryStorage, SampleBlock};

pub type StorageResult<T> = std::result::Result<T, StorageError>;

pub trait SampleSequence: Debug + Send + Sync {
    fn format(&self) -> SampleFormat;

    fn num_samples(&self) -> u64;

    /// Reads `out.len()` samples starting at `start`.
    fn read(&self, start: u64, out: &mut [f32]) -> StorageResult<()>;

    fn write(&mut self, start: u64, samples: &[f32]) -> StorageResult<()>;

    fn append(&mut self, samples: &[f32]) -> StorageResult<()>;

    fn set_silence(&mut self, start: u64, len: u64) -> StorageResult<()>;

    fn insert_silence(&mut self, at: u64, len: u64) -> StorageResult<()>;

    fn delete(&mut self, start: u64, len: u64) -> StorageResult<()>;

    fn paste(&mut self, at: u64, other: &dyn SampleSequence) -> StorageResult<()>;

    fn copy_range(&self, start: u64, end: u64) -> StorageResult<Box<dyn SampleSequence>>;

    /// Start of the block holding `sample`, or `None` past the end.
    fn block_start(&self, sample: u64) -> Option<u64>;

    /// Preferred read length for a request beginning at `sample`.
    fn best_block_size(&self, sample: u64) -> usize;

    fn max_block_size(&self) -> usize;

    fn ideal_block_size(&self) -> usize {
        self.max_block_size()
    }

    fn resample(&mut self, from_rate: u32, to_rate: u32) -> StorageResult<()>;

    fn convert_format(&mut self, format: SampleFormat) -> StorageResult<()>;

    fn flush(&mut self) -> StorageResult<()>;

    fn lock(&self);

    fn unlock(&self);

    /// Locks the blocks for good; used when the owning project closes.
    fn close_lock(&self);

    fn as_any(&self) -> &dyn Any;
}

pub trait StorageFactory: Debug + Send + Sync {
    fn create(&self, format: SampleFormat) -> Box<dyn SampleSequence>;

    fn max_block_size(&self, format: SampleFormat) -> usize;
}
