use std::fs::File;
use std::path::Path;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Interleaved f32 PCM for a whole track.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn frame_count(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frame_count() as u64 * 1_000 / u64::from(self.sample_rate)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("unsupported or corrupt media: {0}")]
    UnsupportedFormat(String),
    #[error("no decodable audio track")]
    NoTrack,
    #[error("failed to create decoder: {0}")]
    Codec(String),
}

/// Decodes the default track of `path` into memory.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let media_source = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let detected = symphonia::default::get_probe()
        .format(
            &hint,
            media_source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| DecodeError::UnsupportedFormat(err.to_string()))?;
    let mut format_reader = detected.format;

    let track = format_reader.default_track().ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
    let mut channels = track
        .codec_params
        .channels
        .map(|channels| channels.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| DecodeError::Codec(err.to_string()))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => {
                debug!("AudioDecoder: stopping at {}: {}", path.display(), err);
                break;
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;
                let mut sample_buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                sample_buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(sample_buffer.samples());
            }
            Err(SymphoniaError::DecodeError(err)) => {
                warn!("AudioDecoder: skipping corrupt packet in {}: {}", path.display(), err);
            }
            Err(err) => {
                warn!("AudioDecoder: decode failed for {}: {}", path.display(), err);
                break;
            }
        }
    }

    debug!(
        "AudioDecoder: decoded {} samples at {} Hz x{} from {}",
        samples.len(),
        sample_rate,
        channels,
        path.display()
    );
    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels: channels.max(1),
    })
}

#[cfg(test)]
mod tests {
    use super::{decode_file, DecodeError, DecodedAudio};
    use std::io::Write;

    fn write_wav(path: &std::path::Path, sample_rate: u32, frames: &[i16]) {
        let data_len = (frames.len() * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for frame in frames {
            bytes.extend_from_slice(&frame.to_le_bytes());
        }
        let mut file = std::fs::File::create(path).expect("create wav");
        file.write_all(&bytes).expect("write wav");
    }

    #[test]
    fn test_decodes_mono_wav_into_memory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tone.wav");
        write_wav(&path, 8_000, &vec![1_000i16; 8_000]);

        let decoded = decode_file(&path).expect("decoded");
        assert_eq!(decoded.sample_rate, 8_000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.frame_count(), 8_000);
        assert_eq!(decoded.duration_ms(), 1_000);
    }

    #[test]
    fn test_garbage_file_is_rejected_as_unsupported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not audio").expect("write");
        assert!(matches!(decode_file(&path), Err(DecodeError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_duration_of_empty_audio_is_zero() {
        let audio = DecodedAudio {
            samples: Vec::new(),
            sample_rate: 0,
            channels: 2,
        };
        assert_eq!(audio.duration_ms(), 0);
    }
}
