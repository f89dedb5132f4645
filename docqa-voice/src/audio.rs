//! Loading of referenced query audio and WAV format inspection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, VoiceError};

/// PCM audio format as described by a WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz (e.g., 16000, 44100).
    pub sample_rate: u32,
    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Bits per sample.
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// 16-bit mono PCM at 16kHz, the format speech recognition expects.
    pub fn pcm16_16khz() -> Self {
        Self { sample_rate: 16_000, channels: 1, bits_per_sample: 16 }
    }

    /// Calculate bytes per second for this format.
    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * self.channels as u32 * (self.bits_per_sample / 8) as u32
    }

    /// Read the `fmt ` chunk of a RIFF/WAVE file.
    ///
    /// Returns `None` if `data` is not a WAV file or has no format chunk.
    pub fn from_wav(data: &[u8]) -> Option<Self> {
        if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
            return None;
        }
        let mut offset = 12;
        while offset + 8 <= data.len() {
            let id = &data[offset..offset + 4];
            let size = u32::from_le_bytes([
                data[offset + 4],
                data[offset + 5],
                data[offset + 6],
                data[offset + 7],
            ]) as usize;
            let body = offset + 8;
            if id == b"fmt " {
                if body + 16 > data.len() {
                    return None;
                }
                let channels = u16::from_le_bytes([data[body + 2], data[body + 3]]);
                let sample_rate = u32::from_le_bytes([
                    data[body + 4],
                    data[body + 5],
                    data[body + 6],
                    data[body + 7],
                ]);
                let bits_per_sample = u16::from_le_bytes([data[body + 14], data[body + 15]]);
                return Some(Self { sample_rate, channels, bits_per_sample });
            }
            // Chunks are padded to an even size.
            offset = body.saturating_add(size).saturating_add(size % 2);
        }
        None
    }
}

/// Where query audio comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    Url(Url),
    Path(PathBuf),
}

impl AudioSource {
    /// A reference with both a scheme and a host is a URL; anything else
    /// is a local path.
    pub fn parse(reference: &str) -> Self {
        match Url::parse(reference) {
            Ok(url) if url.has_host() => Self::Url(url),
            _ => Self::Path(PathBuf::from(reference)),
        }
    }
}

/// Fetches query audio from URLs or the local file system.
///
/// URLs are fetched as given, with no host allow-list. Local paths are
/// refused unless a root directory is set with
/// [`with_local_root`](Self::with_local_root), and then only files under
/// that root are read.
#[derive(Debug, Clone, Default)]
pub struct AudioLoader {
    client: reqwest::Client,
    local_root: Option<PathBuf>,
}

impl AudioLoader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, local_root: None }
    }

    /// Allow local audio files below `root`. Relative references resolve
    /// against it.
    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = Some(root.into());
        self
    }

    /// Load the audio behind `reference`.
    ///
    /// Audio is passed on unchanged. A WAV file that is not 16kHz mono is
    /// logged, since recognition quality drops for other formats.
    pub async fn load(&self, reference: &str) -> Result<Vec<u8>> {
        let data = match AudioSource::parse(reference) {
            AudioSource::Url(url) => {
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| VoiceError::Audio(format!("failed to fetch {url}: {e}")))?;
                response
                    .bytes()
                    .await
                    .map_err(|e| VoiceError::Audio(format!("failed to read {url}: {e}")))?
                    .to_vec()
            }
            AudioSource::Path(path) => self.read_local(&path).await?,
        };

        if data.is_empty() {
            return Err(VoiceError::Audio(format!("audio at {reference} is empty")));
        }
        match AudioFormat::from_wav(&data) {
            Some(format) if format.sample_rate != 16_000 || format.channels != 1 => {
                warn!(
                    sample_rate = format.sample_rate,
                    channels = format.channels,
                    "query audio is not 16kHz mono; recognition may degrade"
                );
            }
            Some(_) => {}
            None => debug!(bytes = data.len(), "query audio is not WAV; format not checked"),
        }
        Ok(data)
    }

    async fn read_local(&self, path: &Path) -> Result<Vec<u8>> {
        let Some(root) = &self.local_root else {
            warn!(path = %path.display(), "local audio refused; no audio root configured");
            return Err(VoiceError::Audio(format!(
                "local audio {} is not allowed; use an audio URL",
                path.display()
            )));
        };
        let read_error =
            |e: std::io::Error| VoiceError::Audio(format!("failed to read {}: {e}", path.display()));

        let root = tokio::fs::canonicalize(root).await.map_err(read_error)?;
        let resolved = tokio::fs::canonicalize(root.join(path)).await.map_err(read_error)?;
        if !resolved.starts_with(&root) {
            warn!(path = %path.display(), root = %root.display(), "local audio outside the audio root");
            return Err(VoiceError::Audio(format!(
                "{} is outside the audio directory",
                path.display()
            )));
        }
        tokio::fs::read(&resolved).await.map_err(read_error)
    }
}

#[cfg(test)]
pub(crate) fn wav_header(format: AudioFormat, payload: &[u8]) -> Vec<u8> {
    let mut wav = Vec::new();
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + payload.len() as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&format.channels.to_le_bytes());
    wav.extend_from_slice(&format.sample_rate.to_le_bytes());
    wav.extend_from_slice(&format.bytes_per_second().to_le_bytes());
    wav.extend_from_slice(&(format.channels * format.bits_per_sample / 8).to_le_bytes());
    wav.extend_from_slice(&format.bits_per_sample.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    wav.extend_from_slice(payload);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wav_format_chunk() {
        let stereo = AudioFormat { sample_rate: 44_100, channels: 2, bits_per_sample: 16 };
        assert_eq!(AudioFormat::from_wav(&wav_header(stereo, &[0; 8])), Some(stereo));
        assert_eq!(AudioFormat::from_wav(b"ID3 not a wav file"), None);
    }

    #[test]
    fn classifies_references() {
        assert!(matches!(AudioSource::parse("https://cdn.example.org/q.wav"), AudioSource::Url(_)));
        assert!(matches!(AudioSource::parse("/tmp/q.wav"), AudioSource::Path(_)));
        assert!(matches!(AudioSource::parse("q.wav"), AudioSource::Path(_)));
    }

    #[tokio::test]
    async fn loads_local_files_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.wav");
        let wav = wav_header(AudioFormat::pcm16_16khz(), &[1, 2, 3, 4]);
        tokio::fs::write(&path, &wav).await.unwrap();

        let loader = AudioLoader::default().with_local_root(dir.path());
        assert_eq!(loader.load(path.to_str().unwrap()).await.unwrap(), wav);
        assert_eq!(loader.load("q.wav").await.unwrap(), wav);

        let err = loader.load("missing.wav").await.unwrap_err();
        assert!(matches!(err, VoiceError::Audio(_)));
    }

    #[tokio::test]
    async fn local_paths_are_refused_without_a_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.wav");
        tokio::fs::write(&path, b"audio").await.unwrap();

        let err = AudioLoader::default().load(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, VoiceError::Audio(ref m) if m.contains("not allowed")));
    }

    #[tokio::test]
    async fn paths_escaping_the_root_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let allowed = dir.path().join("audio");
        tokio::fs::create_dir(&allowed).await.unwrap();
        let secret = dir.path().join("secret.wav");
        tokio::fs::write(&secret, b"not for you").await.unwrap();

        let loader = AudioLoader::default().with_local_root(&allowed);
        for reference in ["../secret.wav", secret.to_str().unwrap()] {
            let err = loader.load(reference).await.unwrap_err();
            assert!(matches!(err, VoiceError::Audio(ref m) if m.contains("outside")), "{reference}");
        }
    }
}
