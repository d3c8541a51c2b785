//! Integration tests for the buffering engine through its public API.

use std::sync::Arc;

use mediabuf_common::{AudioCodec, ChannelLayout, MediaTime, VideoCodec};
use mediabuf_stream::{
    AccessUnit, AudioDecoderConfig, BufferRange, BufferStream, NextBuffer, Spacing,
    StreamSettings, VideoDecoderConfig,
};

fn ms(v: i64) -> MediaTime {
    MediaTime::from_millis(v)
}

fn audio_stream() -> BufferStream {
    BufferStream::new_audio(
        AudioDecoderConfig::new(AudioCodec::Opus, 48_000, ChannelLayout::Stereo, 16),
        StreamSettings::audio(),
    )
}

fn video_stream(memory_limit: usize) -> BufferStream {
    BufferStream::new_video(
        VideoDecoderConfig::new(VideoCodec::Vp9, 1280, 720),
        StreamSettings::video().with_memory_limit(memory_limit),
    )
}

/// Units every 10ms from `start`; `K` marks keyframes.
fn units(start: i64, pattern: &str, size: usize) -> Vec<AccessUnit> {
    pattern
        .chars()
        .enumerate()
        .map(|(i, c)| AccessUnit::new(ms(start + 10 * i as i64), c == 'K', vec![0u8; size]))
        .collect()
}

fn next_timestamp(stream: &mut BufferStream) -> Option<i64> {
    match stream.get_next_buffer() {
        NextBuffer::Buffer(unit) => Some(unit.timestamp().as_millis()),
        _ => None,
    }
}

fn read_all(stream: &mut BufferStream) -> Vec<i64> {
    std::iter::from_fn(|| next_timestamp(stream)).collect()
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[test]
fn append_seek_and_drain_three_buffers() {
    let mut stream = audio_stream();
    stream.on_new_media_segment(ms(0));
    stream.append(units(0, "KDD", 32)).unwrap();

    stream.seek(ms(0));
    assert!(!stream.is_seek_pending());
    assert_eq!(read_all(&mut stream), vec![0, 10, 20]);
    assert_eq!(stream.get_next_buffer(), NextBuffer::NeedMoreData);
}

#[test]
fn overlapping_segment_wins() {
    let mut stream = audio_stream();
    stream.on_new_media_segment(ms(0));
    stream.append(units(0, "KDDD", 10)).unwrap();
    stream.on_new_media_segment(ms(10));
    stream.append(units(10, "KDDD", 20)).unwrap();

    stream.seek(ms(0));
    let mut sizes = Vec::new();
    while let NextBuffer::Buffer(unit) = stream.get_next_buffer() {
        sizes.push((unit.timestamp().as_millis(), unit.data_size()));
    }
    assert_eq!(sizes, vec![(0, 10), (10, 20), (20, 20), (30, 20), (40, 20)]);
}

#[test]
fn repeated_seek_delivers_same_sequence() {
    let mut stream = video_stream(1 << 20);
    stream.on_new_media_segment(ms(0));
    stream.append(units(0, "KDDKDDKDD", 64)).unwrap();

    stream.seek(ms(35));
    let once = read_all(&mut stream);
    stream.seek(ms(35));
    stream.seek(ms(35));
    assert_eq!(read_all(&mut stream), once);
    assert_eq!(once, vec![30, 40, 50, 60, 70, 80]);
}

#[test]
fn config_change_at_boundary() {
    let mut stream = audio_stream();
    stream.on_new_media_segment(ms(0));
    stream.append(units(0, "KK", 8)).unwrap();

    let next = AudioDecoderConfig::new(AudioCodec::Opus, 48_000, ChannelLayout::Stereo, 16)
        .with_extra_data(vec![0x4f, 0x70]);
    stream.update_audio_config(next.clone()).unwrap();
    stream.append(units(20, "KK", 8)).unwrap();

    stream.seek(ms(0));
    assert_eq!(read_all(&mut stream), vec![0, 10]);
    assert_eq!(stream.current_audio_config(), Some(&next));
    assert_eq!(read_all(&mut stream), vec![20, 30]);
}

// ---------------------------------------------------------------------------
// Memory limits
// ---------------------------------------------------------------------------

#[test]
fn gc_never_evicts_playback_position() {
    let mut stream = video_stream(1 << 20);
    stream.on_new_media_segment(ms(0));
    stream.append(units(0, "KDDKDDKDDKDD", 100)).unwrap();
    stream.seek(ms(30));
    assert_eq!(next_timestamp(&mut stream), Some(30));

    stream.set_memory_limit(100);
    stream.append(units(120, "KDD", 100)).unwrap();

    assert!(stream.total_bytes() > 100);
    assert_eq!(read_all(&mut stream), vec![40, 50]);
}

// ---------------------------------------------------------------------------
// Range state
// ---------------------------------------------------------------------------

#[test]
fn delete_all_and_reappend_restores_range() {
    let spacing = Spacing {
        interbuffer_distance: ms(10),
        fudge_multiplier: 2,
    };
    let batch: Vec<Arc<AccessUnit>> = units(0, "KDDKDDKD", 50).into_iter().map(Arc::new).collect();

    let mut range = BufferRange::new(batch.clone(), Some(ms(0)));
    let keyframes = range.keyframe_timestamps();
    let bytes = range.size_in_bytes();
    let seekable: Vec<bool> = (0..10).map(|t| range.can_seek_to(ms(t * 10), spacing)).collect();

    let removed = range.delete_all();
    assert_eq!(removed.buffers.len(), batch.len());
    assert!(range.is_empty());

    range.append_buffers_to_end(batch);
    assert_eq!(range.keyframe_timestamps(), keyframes);
    assert_eq!(range.size_in_bytes(), bytes);
    let reseekable: Vec<bool> = (0..10).map(|t| range.can_seek_to(ms(t * 10), spacing)).collect();
    assert_eq!(reseekable, seekable);
}

#[test]
fn ranges_stay_ordered_and_disjoint() {
    let mut stream = video_stream(1 << 20);
    for (start, pattern) in [(500, "KDD"), (0, "KDDKD"), (200, "KDDDD"), (40, "KDD"), (230, "KD")] {
        stream.on_new_media_segment(ms(start));
        stream.append(units(start, pattern, 16)).unwrap();
    }

    let ranges = stream.ranges();
    for pair in ranges.windows(2) {
        assert!(pair[0].end_timestamp() < pair[1].start_timestamp());
    }
    for range in ranges {
        assert!(range.buffers().next().unwrap().is_keyframe());
        let ts: Vec<_> = range.buffers().map(|b| b.timestamp()).collect();
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
    }

    let buffered = stream.buffered_ranges();
    assert_eq!(buffered.len(), ranges.len());
}

#[test]
fn end_of_stream_after_last_buffer() {
    let mut stream = video_stream(1 << 20);
    stream.on_new_media_segment(ms(0));
    stream.append(units(0, "KD", 16)).unwrap();
    stream.mark_end_of_stream();

    stream.seek(ms(0));
    assert_eq!(read_all(&mut stream), vec![0, 10]);
    assert_eq!(stream.get_next_buffer(), NextBuffer::EndOfStream);
    assert!(stream.append(units(20, "K", 16)).is_err());
}
