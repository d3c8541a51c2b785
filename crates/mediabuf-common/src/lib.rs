//! Mediabuf-Common: shared value types for the media buffering engine.
//!
//! - **Time**: `MediaTime`, a signed microsecond timestamp/duration
//! - **Ranges**: `TimeRanges`, sorted disjoint `[start, end)` intervals
//! - **Types**: track kinds and codec/channel vocabulary
//!
//! # Examples
//!
//! ```
//! use mediabuf_common::{MediaTime, TimeRanges};
//!
//! let mut buffered = TimeRanges::new();
//! buffered.add(MediaTime::ZERO, MediaTime::from_millis(500));
//! buffered.add(MediaTime::from_millis(500), MediaTime::from_millis(900));
//! assert_eq!(buffered.len(), 1);
//! ```

pub mod ranges;
pub mod time;
pub mod types;

pub use ranges::TimeRanges;
pub use time::MediaTime;
pub use types::*;
