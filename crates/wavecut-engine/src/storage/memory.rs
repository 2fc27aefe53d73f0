use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{SampleSequence, StorageFactory, StorageResult};
use crate::error::StorageError;
use crate::format::SampleFormat;

pub const DEFAULT_MAX_BLOCK_SIZE: usize = 65_536;

/// Immutable run of samples shared between every sequence that references it.
///
/// A block may be created deferred: its length is known but the samples are
/// delivered later by a loader through [`SampleBlock::materialize`]. Reading a
/// deferred block reports [`StorageError::Unavailable`].
#[derive(Debug)]
pub struct SampleBlock {
    len: usize,
    samples: RwLock<Option<Arc<[f32]>>>,
    locks: AtomicUsize,
    closed: AtomicBool,
}

impl SampleBlock {
    fn ready(samples: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            len: samples.len(),
            samples: RwLock::new(Some(samples.into())),
            locks: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    fn deferred(len: usize) -> Arc<Self> {
        Arc::new(Self {
            len,
            samples: RwLock::new(None),
            locks: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_available(&self) -> bool {
        self.samples.read().is_some()
    }

    /// Delivers the samples of a deferred block.
    pub fn materialize(&self, samples: Vec<f32>) -> StorageResult<()> {
        if samples.len() != self.len {
            return Err(StorageError::Rejected(format!(
                "block expects {} samples, got {}",
                self.len,
                samples.len()
            )));
        }
        *self.samples.write() = Some(samples.into());
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locks.load(Ordering::Acquire) > 0
    }

    fn data(&self, start: u64) -> StorageResult<Arc<[f32]>> {
        self.samples
            .read()
            .clone()
            .ok_or(StorageError::Unavailable { start })
    }

    fn lock(&self) {
        self.locks.fetch_add(1, Ordering::AcqRel);
    }

    fn unlock(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let _ = self
            .locks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            });
    }

    fn close(&self) {
        self.lock();
        self.closed.store(true, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
struct SeqBlock {
    start: u64,
    block: Arc<SampleBlock>,
}

impl SeqBlock {
    fn end(&self) -> u64 {
        self.start + self.block.len as u64
    }
}

/// In-memory sequence of copy-on-write blocks.
#[derive(Debug, Clone)]
pub struct MemorySequence {
    format: SampleFormat,
    max_block_size: usize,
    blocks: Vec<SeqBlock>,
    num_samples: u64,
}

impl MemorySequence {
    pub fn new(format: SampleFormat, max_block_size: usize) -> Self {
        Self {
            format,
            max_block_size: max_block_size.max(1),
            blocks: Vec::new(),
            num_samples: 0,
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Arc<SampleBlock>> {
        self.blocks.iter().map(|seq| &seq.block)
    }

    /// Appends a block whose samples arrive later. The returned handle is
    /// what a background loader fills in.
    pub fn append_deferred(&mut self, len: usize) -> Arc<SampleBlock> {
        let block = SampleBlock::deferred(len);
        self.blocks.push(SeqBlock {
            start: self.num_samples,
            block: Arc::clone(&block),
        });
        self.num_samples += len as u64;
        block
    }

    fn find_block(&self, sample: u64) -> usize {
        self.blocks
            .partition_point(|seq| seq.start <= sample)
            .saturating_sub(1)
    }

    fn check_range(&self, start: u64, len: u64) -> StorageResult<()> {
        if start.checked_add(len).map_or(true, |end| end > self.num_samples) {
            return Err(StorageError::OutOfRange {
                start,
                len,
                available: self.num_samples,
            });
        }
        Ok(())
    }

    /// Blocks covering `[start, end)`. Whole blocks are shared, partially
    /// covered ones are copied.
    fn slice_blocks(&self, start: u64, end: u64) -> StorageResult<Vec<Arc<SampleBlock>>> {
        let mut out = Vec::new();
        if start >= end {
            return Ok(out);
        }
        let mut index = self.find_block(start);
        while index < self.blocks.len() && self.blocks[index].start < end {
            let seq = &self.blocks[index];
            let from = start.max(seq.start);
            let to = end.min(seq.end());
            if from == seq.start && to == seq.end() {
                out.push(Arc::clone(&seq.block));
            } else if from < to {
                let data = seq.block.data(seq.start)?;
                let lo = (from - seq.start) as usize;
                let hi = (to - seq.start) as usize;
                out.push(SampleBlock::ready(data[lo..hi].to_vec()));
            }
            index += 1;
        }
        Ok(out)
    }

    fn chunk(&self, mut samples: Vec<f32>) -> Vec<Arc<SampleBlock>> {
        self.format.quantize_slice(&mut samples);
        samples
            .chunks(self.max_block_size)
            .map(|chunk| SampleBlock::ready(chunk.to_vec()))
            .collect()
    }

    fn silence_blocks(&self, len: u64) -> Vec<Arc<SampleBlock>> {
        let mut out = Vec::new();
        let mut remaining = len;
        while remaining > 0 {
            let size = remaining.min(self.max_block_size as u64);
            out.push(SampleBlock::ready(vec![0.0; size as usize]));
            remaining -= size;
        }
        out
    }

    fn assemble(&mut self, blocks: Vec<Arc<SampleBlock>>) {
        let mut start = 0u64;
        self.blocks = blocks
            .into_iter()
            .filter(|block| !block.is_empty())
            .map(|block| {
                let seq = SeqBlock { start, block };
                start = seq.end();
                seq
            })
            .collect();
        self.num_samples = start;
    }

    fn read_all(&self) -> StorageResult<Vec<f32>> {
        let mut samples = vec![0.0; self.num_samples as usize];
        self.read(0, &mut samples)?;
        Ok(samples)
    }

    fn splice(
        &mut self,
        at: u64,
        remove: u64,
        middle: Vec<Arc<SampleBlock>>,
    ) -> StorageResult<()> {
        let mut blocks = self.slice_blocks(0, at)?;
        blocks.extend(middle);
        blocks.extend(self.slice_blocks(at + remove, self.num_samples)?);
        self.assemble(blocks);
        Ok(())
    }
}

impl SampleSequence for MemorySequence {
    fn format(&self) -> SampleFormat {
        self.format
    }

    fn num_samples(&self) -> u64 {
        self.num_samples
    }

    fn read(&self, start: u64, out: &mut [f32]) -> StorageResult<()> {
        self.check_range(start, out.len() as u64)?;
        let mut written = 0usize;
        let mut position = start;
        while written < out.len() {
            let seq = &self.blocks[self.find_block(position)];
            let data = seq.block.data(seq.start)?;
            let offset = (position - seq.start) as usize;
            let count = (data.len() - offset).min(out.len() - written);
            out[written..written + count].copy_from_slice(&data[offset..offset + count]);
            written += count;
            position += count as u64;
        }
        Ok(())
    }

    fn write(&mut self, start: u64, samples: &[f32]) -> StorageResult<()> {
        let len = samples.len() as u64;
        self.check_range(start, len)?;
        if len == 0 {
            return Ok(());
        }
        let middle = self.chunk(samples.to_vec());
        self.splice(start, len, middle)
    }

    fn append(&mut self, samples: &[f32]) -> StorageResult<()> {
        let mut rest = samples;
        if let Some(last) = self.blocks.last() {
            let room = self.max_block_size.saturating_sub(last.block.len);
            if room > 0 && !rest.is_empty() && last.block.is_available() {
                let take = room.min(rest.len());
                let mut merged = last.block.data(last.start)?.to_vec();
                let mut head = rest[..take].to_vec();
                self.format.quantize_slice(&mut head);
                merged.extend_from_slice(&head);
                let start = last.start;
                if let Some(slot) = self.blocks.last_mut() {
                    *slot = SeqBlock {
                        start,
                        block: SampleBlock::ready(merged),
                    };
                }
                self.num_samples += take as u64;
                rest = &rest[take..];
            }
        }
        for block in self.chunk(rest.to_vec()) {
            let seq = SeqBlock {
                start: self.num_samples,
                block,
            };
            self.num_samples = seq.end();
            self.blocks.push(seq);
        }
        Ok(())
    }

    fn set_silence(&mut self, start: u64, len: u64) -> StorageResult<()> {
        self.check_range(start, len)?;
        if len == 0 {
            return Ok(());
        }
        let middle = self.silence_blocks(len);
        self.splice(start, len, middle)
    }

    fn insert_silence(&mut self, at: u64, len: u64) -> StorageResult<()> {
        self.check_range(at, 0)?;
        if len == 0 {
            return Ok(());
        }
        let middle = self.silence_blocks(len);
        self.splice(at, 0, middle)
    }

    fn delete(&mut self, start: u64, len: u64) -> StorageResult<()> {
        self.check_range(start, len)?;
        if len == 0 {
            return Ok(());
        }
        self.splice(start, len, Vec::new())
    }

    fn paste(&mut self, at: u64, other: &dyn SampleSequence) -> StorageResult<()> {
        self.check_range(at, 0)?;
        let len = other.num_samples();
        if len == 0 {
            return Ok(());
        }
        let middle = match other.as_any().downcast_ref::<MemorySequence>() {
            Some(memory) if memory.format == self.format => memory.slice_blocks(0, len)?,
            _ => {
                let mut samples = vec![0.0; len as usize];
                other.read(0, &mut samples)?;
                self.chunk(samples)
            }
        };
        self.splice(at, 0, middle)
    }

    fn copy_range(&self, start: u64, end: u64) -> StorageResult<Box<dyn SampleSequence>> {
        self.check_range(start, end.saturating_sub(start))?;
        let mut copy = MemorySequence::new(self.format, self.max_block_size);
        copy.assemble(self.slice_blocks(start, end)?);
        Ok(Box::new(copy))
    }

    fn block_start(&self, sample: u64) -> Option<u64> {
        if sample >= self.num_samples {
            return None;
        }
        Some(self.blocks[self.find_block(sample)].start)
    }

    fn best_block_size(&self, sample: u64) -> usize {
        if sample >= self.num_samples {
            return self.max_block_size;
        }
        let mut index = self.find_block(sample);
        let seq = &self.blocks[index];
        let mut result = (seq.end() - sample) as usize;
        let min_samples = self.max_block_size / 2;
        while result < min_samples && index + 1 < self.blocks.len() {
            let next = self.blocks[index + 1].block.len;
            if result + next > self.max_block_size {
                break;
            }
            index += 1;
            result += next;
        }
        result
    }

    fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    fn resample(&mut self, from_rate: u32, to_rate: u32) -> StorageResult<()> {
        if from_rate == to_rate {
            return Ok(());
        }
        let samples = self.read_all()?;
        let converted = resample::resample_buffer(&samples, from_rate, to_rate);
        let blocks = self.chunk(converted);
        self.assemble(blocks);
        Ok(())
    }

    fn convert_format(&mut self, format: SampleFormat) -> StorageResult<()> {
        if format == self.format {
            return Ok(());
        }
        let samples = self.read_all()?;
        self.format = format;
        let blocks = self.chunk(samples);
        self.assemble(blocks);
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn lock(&self) {
        for seq in &self.blocks {
            seq.block.lock();
        }
    }

    fn unlock(&self) {
        for seq in &self.blocks {
            seq.block.unlock();
        }
    }

    fn close_lock(&self) {
        for seq in &self.blocks {
            seq.block.close();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory handing out [`MemorySequence`]s.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    max_block_size: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
        }
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_block_size(mut self, max_block_size: usize) -> Self {
        self.max_block_size = max_block_size.max(1);
        self
    }
}

impl StorageFactory for MemoryStorage {
    fn create(&self, format: SampleFormat) -> Box<dyn SampleSequence> {
        Box::new(MemorySequence::new(format, self.max_block_size))
    }

    fn max_block_size(&self, _format: SampleFormat) -> usize {
        self.max_block_size
    }
}
