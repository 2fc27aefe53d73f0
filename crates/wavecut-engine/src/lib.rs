//! Wavecut Engine
//! ==============
//! Clip-based waveform track editing. A [`Track`] owns a collection of
//! [`Clip`]s placed on a timeline and implements every region edit on top of
//! them: clear, cut, copy, paste, split, join, silence and cut lines. Sample
//! storage sits behind the [`StorageFactory`] seam and sequential reads go
//! through a [`TrackCache`].

pub mod cache;
pub mod clip;
pub mod config;
pub mod envelope;
pub mod error;
pub mod format;
pub mod storage;
pub mod time;
pub mod track;
pub mod warp;

pub use cache::{CachedSamples, TrackCache};
pub use clip::{Clip, ClipId, ClipSummary};
pub use config::EditConfig;
pub use envelope::{Envelope, EnvelopePoint};
pub use error::{EditError, Result, StorageError};
pub use format::SampleFormat;
pub use storage::{MemoryStorage, SampleSequence, StorageFactory};
pub use time::SampleCount;
pub use track::{AllClips, FillMode, Location, Track, TrackSummary};
pub use warp::{IdentityTimeWarper, LinearTimeWarper, ShiftTimeWarper, TimeWarper};
