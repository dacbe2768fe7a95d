//! Symphonia-backed songs
//!
//! Every registered format shares one implementation: symphonia's probe picks
//! the demuxer, the default codec registry picks the decoder, and samples are
//! converted to interleaved `f32`.

use super::{CodecRegistry, Song, StreamOpener};
use crate::error::{Error, Result};
use jukebox_common::SongInfo;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::{Hint, ProbeResult};
use symphonia::core::units::Time;
use tracing::{debug, warn};

/// Consecutive undecodable packets tolerated before the song fails
const MAX_DECODE_RETRIES: usize = 3;

/// Register the formats symphonia is built with
pub fn register_all(registry: &mut CodecRegistry) {
    registry.register("wav", b"RIFF????WAVE", &["wav", "wave"], decode);
    registry.register("flac", b"fLaC", &["flac"], decode);
    registry.register("ogg", b"OggS", &["ogg", "oga"], decode);
    registry.register("mp3", b"ID3", &["mp3"], decode);
}

/// Probe the stream for metadata and return it as a single lazy song
fn decode(opener: StreamOpener, extension: Option<&str>) -> Result<Vec<Box<dyn Song>>> {
    let song = SymphoniaSong::probe(opener, extension)?;
    Ok(vec![Box::new(song)])
}

struct OpenStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    /// Frames to discard after an accurate seek
    skip_frames: u64,
}

/// Song decoded with symphonia
pub struct SymphoniaSong {
    opener: StreamOpener,
    extension: Option<String>,
    info: SongInfo,
    sample_rate: u32,
    channels: u16,
    total_frames: Option<u64>,
    emitted_frames: u64,
    stream: Option<OpenStream>,
}

impl SymphoniaSong {
    /// Read format parameters and tags without keeping the stream open
    pub fn probe(opener: StreamOpener, extension: Option<&str>) -> Result<Self> {
        let mut probed = open_format(&opener, extension)?;
        let mut info = read_tags(&mut probed);

        let track = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;
        let params = &track.codec_params;

        let sample_rate = params
            .sample_rate
            .filter(|&rate| rate > 0)
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;
        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .filter(|&count| count > 0)
            .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;
        let total_frames = params.n_frames;

        if let Some(frames) = total_frames {
            info.duration_ms = frames * 1000 / sample_rate as u64;
        }

        Ok(Self {
            opener,
            extension: extension.map(str::to_string),
            info,
            sample_rate,
            channels,
            total_frames,
            emitted_frames: 0,
            stream: None,
        })
    }

    fn open(&mut self) -> Result<&mut OpenStream> {
        if self.stream.is_none() {
            let probed = open_format(&self.opener, self.extension.as_deref())?;
            let format = probed.format;
            let track = format
                .tracks()
                .iter()
                .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
                .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;
            let track_id = track.id;
            let decoder = symphonia::default::get_codecs()
                .make(&track.codec_params, &DecoderOptions::default())?;

            self.emitted_frames = 0;
            self.stream = Some(OpenStream {
                format,
                decoder,
                track_id,
                sample_buf: None,
                skip_frames: 0,
            });
        }
        self.stream
            .as_mut()
            .ok_or_else(|| Error::Internal("stream not open".to_string()))
    }

    /// The stream hit EOF: normal end, or truncated when well short of its
    /// declared length
    fn end_of_stream(&self) -> Result<Vec<f32>> {
        match self.total_frames {
            Some(total) if self.emitted_frames + (self.sample_rate as u64) < total => {
                Err(Error::Truncated(format!(
                    "stream ended at frame {} of {}",
                    self.emitted_frames, total
                )))
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl Song for SymphoniaSong {
    fn init(&mut self) -> Result<(u32, u16)> {
        self.open()?;
        Ok((self.sample_rate, self.channels))
    }

    fn play(&mut self, n: usize) -> Result<Vec<f32>> {
        let channels = self.channels as usize;
        let mut out = Vec::with_capacity(n);
        let mut decode_errors = 0;

        while out.len() < n {
            let stream = self.open()?;
            let packet = match stream.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    if out.is_empty() {
                        return self.end_of_stream();
                    }
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    stream.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != stream.track_id {
                continue;
            }

            let decoded = match stream.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    decode_errors += 1;
                    warn!("Decode error: {}", e);
                    if decode_errors > MAX_DECODE_RETRIES {
                        return Err(Error::Decode(e.to_string()));
                    }
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            decode_errors = 0;

            let needed = decoded.capacity();
            let fits = stream
                .sample_buf
                .as_ref()
                .is_some_and(|buf| buf.capacity() >= needed);
            if !fits {
                stream.sample_buf = Some(SampleBuffer::<f32>::new(needed as u64, *decoded.spec()));
            }
            let Some(buf) = stream.sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            let samples = buf.samples();
            let frames = (samples.len() / channels) as u64;
            let skip = stream.skip_frames.min(frames);
            stream.skip_frames -= skip;
            out.extend_from_slice(&samples[skip as usize * channels..]);
            self.emitted_frames += frames - skip;
        }

        Ok(out)
    }

    fn seek(&mut self, to: Duration) -> Result<()> {
        if self.info.duration_ms == 0 {
            return Err(Error::SeekUnsupported(
                "song duration is unknown".to_string(),
            ));
        }
        let sample_rate = self.sample_rate as u64;
        let stream = self.open()?;
        let seeked = stream
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::from(to.as_secs_f64()),
                    track_id: Some(stream.track_id),
                },
            )
            .map_err(|e| Error::Decode(format!("seek failed: {}", e)))?;
        stream.decoder.reset();
        stream.skip_frames = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.emitted_frames = to.as_millis() as u64 * sample_rate / 1000;
        debug!("Seeked to {:?} (ts {})", to, seeked.required_ts);
        Ok(())
    }

    fn info(&self) -> SongInfo {
        self.info.clone()
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

fn open_format(opener: &StreamOpener, extension: Option<&str>) -> Result<ProbeResult> {
    let source = opener()?;
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    Ok(probed)
}

fn read_tags(probed: &mut ProbeResult) -> SongInfo {
    let mut info = SongInfo::default();
    if let Some(revision) = probed.format.metadata().current() {
        apply_tags(revision, &mut info);
    } else if let Some(revision) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
        apply_tags(revision, &mut info);
    }
    info
}

fn apply_tags(revision: &MetadataRevision, info: &mut SongInfo) {
    for tag in revision.tags() {
        let value = tag.value.to_string();
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) => info.title = value,
            Some(StandardTagKey::Artist) => info.artist = value,
            Some(StandardTagKey::Album) => info.album = value,
            Some(StandardTagKey::TrackNumber) => {
                // "3" or "3/12"
                if let Some(n) = value.split('/').next().and_then(|n| n.trim().parse().ok()) {
                    info.track = n;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::file_opener;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn write_wav(path: &std::path::Path, sample_rate: u32, channels: u16, frames: u32) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            for _ in 0..channels {
                writer.write_sample(((i % 100) as i16) * 100).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_probe_reads_format_and_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 8000, 2, 8000);

        let song = SymphoniaSong::probe(file_opener(&path), Some("wav")).unwrap();
        assert_eq!(song.sample_rate, 8000);
        assert_eq!(song.channels, 2);
        assert_eq!(song.info().duration_ms, 1000);
    }

    /// Minimal PCM WAV with arbitrary header fields
    fn write_raw_wav(path: &std::path::Path, sample_rate: u32, channels: u16) {
        let data = [0u8; 64];
        let block_align = channels.max(1) * 2;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_probe_rejects_zero_format_fields() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("zero_rate.wav");
        write_raw_wav(&path, 0, 1);
        assert!(SymphoniaSong::probe(file_opener(&path), Some("wav")).is_err());

        let path = dir.path().join("zero_channels.wav");
        write_raw_wav(&path, 8000, 0);
        assert!(SymphoniaSong::probe(file_opener(&path), Some("wav")).is_err());
    }

    #[test]
    fn test_play_until_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 8000, 1, 4000);

        let mut song = SymphoniaSong::probe(file_opener(&path), Some("wav")).unwrap();
        assert_eq!(song.init().unwrap(), (8000, 1));

        let mut total = 0;
        loop {
            let chunk = song.play(1024).unwrap();
            if chunk.is_empty() {
                break;
            }
            total += chunk.len();
        }
        assert_eq!(total, 4000);

        // Reopen after close starts from the top
        song.close();
        song.init().unwrap();
        assert!(!song.play(10).unwrap().is_empty());
    }

    #[test]
    fn test_seek_repositions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 8000, 1, 16000);

        let mut song = SymphoniaSong::probe(file_opener(&path), Some("wav")).unwrap();
        song.init().unwrap();
        song.seek(Duration::from_millis(1500)).unwrap();

        let mut rest = 0;
        loop {
            let chunk = song.play(2048).unwrap();
            if chunk.is_empty() {
                break;
            }
            rest += chunk.len();
        }
        assert_eq!(rest, 4000);
    }

    #[test]
    fn test_registry_decodes_wav_by_sniffing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_extension");
        write_wav(&path, 8000, 1, 800);

        let registry = CodecRegistry::with_defaults();
        let (songs, name) = registry.decode(file_opener(&path)).unwrap();
        assert_eq!(name, "wav");
        assert_eq!(songs.len(), 1);
    }
}
