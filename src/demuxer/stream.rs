//! One track of a media source, shared between the appending side and an
//! async reader.

use std::sync::Arc;

use mediabuf_common::{MediaTime, TimeRanges, TrackKind};
use mediabuf_stream::{
    AccessUnit, AppendError, AudioDecoderConfig, BufferStream, ConfigId, ConfigResult, NextBuffer,
    StreamSettings, VideoDecoderConfig,
};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Result of an async read from a demuxer stream.
#[derive(Debug, Clone, PartialEq)]
pub enum DemuxerRead {
    /// The next access unit in decode order.
    Buffer(Arc<AccessUnit>),
    /// The decoder must fetch the current config before reading again.
    ConfigChanged,
    /// Playback reached the end of the stream.
    EndOfStream(Arc<AccessUnit>),
    /// A seek started while the read was waiting.
    Aborted,
}

#[derive(Debug)]
struct Inner {
    stream: BufferStream,
    /// Bumped by every seek so that waiting reads can tell they were aborted.
    seek_generation: u64,
}

/// A `BufferStream` guarded for use from an appending task and a reading task.
///
/// All engine calls run under the lock and never suspend; `read` waits for
/// data with the lock released.
#[derive(Debug)]
pub struct ChunkDemuxerStream {
    kind: TrackKind,
    inner: Mutex<Inner>,
    data_available: Notify,
}

impl ChunkDemuxerStream {
    pub fn new_audio(config: AudioDecoderConfig, settings: StreamSettings) -> Arc<Self> {
        Self::with_stream(BufferStream::new_audio(config, settings))
    }

    pub fn new_video(config: VideoDecoderConfig, settings: StreamSettings) -> Arc<Self> {
        Self::with_stream(BufferStream::new_video(config, settings))
    }

    fn with_stream(stream: BufferStream) -> Arc<Self> {
        Arc::new(Self {
            kind: stream.kind(),
            inner: Mutex::new(Inner {
                stream,
                seek_generation: 0,
            }),
            data_available: Notify::new(),
        })
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Read the next buffer, waiting while nothing is buffered at the read
    /// position.
    ///
    /// After `ConfigChanged`, call `audio_decoder_config` or
    /// `video_decoder_config` before reading again.
    pub async fn read(&self) -> DemuxerRead {
        let generation = self.inner.lock().seek_generation;

        loop {
            let notified = self.data_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock();
                if inner.seek_generation != generation {
                    tracing::trace!(kind = %self.kind, "Read aborted by seek");
                    return DemuxerRead::Aborted;
                }
                match inner.stream.get_next_buffer() {
                    NextBuffer::Buffer(unit) => return DemuxerRead::Buffer(unit),
                    NextBuffer::ConfigChange => return DemuxerRead::ConfigChanged,
                    NextBuffer::EndOfStream => {
                        return DemuxerRead::EndOfStream(Arc::new(AccessUnit::end_of_stream()))
                    }
                    NextBuffer::NeedMoreData => {}
                }
            }

            notified.await;
        }
    }

    pub fn on_new_media_segment(&self, start: MediaTime) {
        self.inner.lock().stream.on_new_media_segment(start);
    }

    pub fn append(&self, buffers: Vec<AccessUnit>) -> Result<(), AppendError> {
        let result = self.inner.lock().stream.append(buffers);
        if result.is_ok() {
            self.data_available.notify_waiters();
        }
        result
    }

    pub fn update_audio_config(&self, config: AudioDecoderConfig) -> ConfigResult<ConfigId> {
        self.inner.lock().stream.update_audio_config(config)
    }

    pub fn update_video_config(&self, config: VideoDecoderConfig) -> ConfigResult<ConfigId> {
        self.inner.lock().stream.update_video_config(config)
    }

    /// Current audio config, acknowledging a pending config change.
    pub fn audio_decoder_config(&self) -> Option<AudioDecoderConfig> {
        self.inner.lock().stream.current_audio_config().cloned()
    }

    /// Current video config, acknowledging a pending config change.
    pub fn video_decoder_config(&self) -> Option<VideoDecoderConfig> {
        self.inner.lock().stream.current_video_config().cloned()
    }

    /// Seek the track. Reads waiting at the time of the call are aborted.
    pub fn seek(&self, timestamp: MediaTime) {
        {
            let mut inner = self.inner.lock();
            inner.seek_generation += 1;
            inner.stream.seek(timestamp);
        }
        self.data_available.notify_waiters();
    }

    pub fn is_seek_pending(&self) -> bool {
        self.inner.lock().stream.is_seek_pending()
    }

    pub fn remove(&self, start: MediaTime, end: MediaTime, duration: MediaTime) {
        self.inner.lock().stream.remove(start, end, duration);
        self.data_available.notify_waiters();
    }

    pub fn on_set_duration(&self, duration: MediaTime) {
        self.inner.lock().stream.on_set_duration(duration);
        self.data_available.notify_waiters();
    }

    /// Mark the end of the stream. Does nothing if already marked.
    pub fn mark_end_of_stream(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.stream.is_end_of_stream() {
                return;
            }
            inner.stream.mark_end_of_stream();
        }
        self.data_available.notify_waiters();
    }

    /// Clear the end-of-stream mark. Does nothing if not marked.
    pub fn unmark_end_of_stream(&self) {
        let mut inner = self.inner.lock();
        if inner.stream.is_end_of_stream() {
            inner.stream.unmark_end_of_stream();
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.inner.lock().stream.is_end_of_stream()
    }

    pub fn buffered_ranges(&self) -> TimeRanges {
        self.inner.lock().stream.buffered_ranges()
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().stream.total_bytes()
    }
}
