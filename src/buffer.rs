// Conjure
// Copyright (C) 2021  Wesley Merkel
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Sample buffers.
//!
//! A [`Buffer`] is created from one of two recipes:
//!
//! * An [`Allocation`] - a zero filled buffer of a given size, optionally filled with samples
//!   streamed from the client.
//! * A sound file path - the server reads the file into a new buffer. Files that are not in one of
//!   the [`NATIVE_FORMATS`] are converted by a [`Transcoder`] first.
//!
//! The buffer number is the lowest free one found by [`alloc::buffer_id`].

use crate::{
    alloc,
    error::{Error, Result},
    server::{
        reply, BufferAllocate, BufferAllocateRead, BufferFree, BufferInfo, BufferQuery,
        BufferSetRange, Server,
    },
};
use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
};

/// The most samples sent in a single `/b_setn`.
///
/// Keeps each datagram comfortably below the UDP size limit.
pub const SAMPLES_PER_MESSAGE: usize = 1024;

/// File extensions the server reads without conversion.
pub const NATIVE_FORMATS: &[&str] = &["wav", "flac", "aiff", "aif"];

/// The size of a buffer to allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub channels: i32,
    pub frames: i32,
}

/// What is known about a buffer before a handle is made for it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferSpec {
    pub id: Option<i32>,
    pub path: Option<PathBuf>,
    pub allocate: Option<Allocation>,
}

/// Converts sound files the server cannot read into ones it can.
pub trait Transcoder {
    /// Converts the file at `path` and returns the path of the result.
    fn transcode(&self, path: &Path) -> Result<PathBuf>;
}

/// A [`Transcoder`] that runs the `ffmpeg` command.
///
/// Files are converted to 44.1kHz stereo WAV files in a cache directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ffmpeg {
    cache_dir: PathBuf,
}

impl Default for Ffmpeg {
    /// Caches converted files in `conjure-audio-cache` under the system temporary directory.
    fn default() -> Ffmpeg {
        Ffmpeg::new(env::temp_dir().join("conjure-audio-cache"))
    }
}

impl Ffmpeg {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Ffmpeg {
        Ffmpeg {
            cache_dir: cache_dir.into(),
        }
    }

    /// Where the converted version of `path` is written.
    pub fn output_path(&self, path: &Path) -> PathBuf {
        let stem = path.file_stem().unwrap_or_else(|| path.as_os_str());
        self.cache_dir.join(format!("{}.wav", stem.to_string_lossy()))
    }
}

impl Transcoder for Ffmpeg {
    fn transcode(&self, path: &Path) -> Result<PathBuf> {
        let failed = |reason: String| Error::Transcode {
            path: path.to_owned(),
            reason,
        };
        fs::create_dir_all(&self.cache_dir).map_err(|err| failed(err.to_string()))?;

        let output_path = self.output_path(path);
        log::debug!("transcoding {:?} to {:?}", path, output_path);
        let output = Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(path)
            .arg("-ar")
            .arg("44100")
            .arg("-ac")
            .arg("2")
            .arg(&output_path)
            .output()
            .map_err(|err| failed(format!("running ffmpeg: {}", err)))?;

        if !output.status.success() {
            return Err(failed(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output_path)
    }
}

/// True if the server can read the file without conversion.
pub fn is_native_format(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map_or(false, |extension| {
            NATIVE_FORMATS
                .iter()
                .any(|native| extension.eq_ignore_ascii_case(native))
        })
}

/// A handle to a buffer on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    id: Option<i32>,
    path: Option<PathBuf>,
    allocation: Option<Allocation>,
}

impl Buffer {
    /// An unbound buffer that will be allocated with the given size.
    pub fn allocate(channels: i32, frames: i32) -> Buffer {
        Buffer {
            id: None,
            path: None,
            allocation: Some(Allocation { channels, frames }),
        }
    }

    /// An unbound buffer that will be read from a sound file.
    pub fn read(path: impl Into<PathBuf>) -> Buffer {
        Buffer {
            id: None,
            path: Some(path.into()),
            allocation: None,
        }
    }

    /// A handle to a buffer that already exists on the server.
    pub fn existing(id: i32) -> Buffer {
        Buffer {
            id: Some(id),
            path: None,
            allocation: None,
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the [`BufferSpec`] has no id, path, or allocation.
    pub fn from_spec(spec: BufferSpec) -> Result<Buffer> {
        if spec.id.is_none() && spec.path.is_none() && spec.allocate.is_none() {
            return Err(Error::InvalidConfiguration(
                "a buffer needs an id, a path, or an allocation",
            ));
        }
        Ok(Buffer {
            id: spec.id,
            path: spec.path,
            allocation: spec.allocate,
        })
    }

    pub fn id(&self) -> Option<i32> {
        self.id
    }

    fn bound(&self) -> Result<i32> {
        self.id.ok_or(Error::Unbound { entity: "buffer" })
    }

    /// Creates the buffer, converting sound files with [`Ffmpeg`] when needed.
    ///
    /// See [`create_with`](Buffer::create_with).
    pub fn create(&mut self, server: &Server, data: &[f32]) -> Result<i32> {
        self.create_with(server, data, &Ffmpeg::default())
    }

    /// Creates the buffer. Does nothing if the buffer already has an id. Returns the id.
    ///
    /// An allocated buffer is filled with `data`, interleaved by channel, starting at the first
    /// sample. `data` is ignored for buffers read from a file.
    ///
    /// # Errors
    ///
    /// * Returns [`Error::InvalidConfiguration`] if `data` does not fit in the allocation.
    /// * Returns [`Error::PathNotFound`] if the sound file does not exist locally.
    /// * Returns [`Error::Rejected`] if the server fails to allocate or read the buffer.
    pub fn create_with(
        &mut self,
        server: &Server,
        data: &[f32],
        transcoder: &dyn Transcoder,
    ) -> Result<i32> {
        if let Some(id) = self.id {
            return Ok(id);
        }
        let id = match (self.allocation, &self.path) {
            (Some(allocation), _) => allocate(server, allocation, data)?,
            (None, Some(path)) => read(server, path, transcoder)?,
            (None, None) => {
                return Err(Error::InvalidConfiguration(
                    "a buffer needs a path or an allocation to be created",
                ))
            }
        };
        log::debug!("created buffer {}", id);
        self.id = Some(id);
        Ok(id)
    }

    /// The server's current information about this buffer.
    pub fn info(&self, server: &Server) -> Result<BufferInfo> {
        let id = self.bound()?;
        query(server, vec![id])?
            .into_iter()
            .find(|info| info.buffer_number == id)
            .ok_or_else(|| Error::UnexpectedReply {
                addr: "/b_info".to_owned(),
            })
    }

    pub fn channels(&self, server: &Server) -> Result<i32> {
        Ok(self.info(server)?.number_of_channels)
    }

    pub fn frames(&self, server: &Server) -> Result<i32> {
        Ok(self.info(server)?.number_of_frames)
    }

    pub fn sample_rate(&self, server: &Server) -> Result<f32> {
        Ok(self.info(server)?.sample_rate)
    }

    /// Frees the buffer's memory on the server. Does nothing if the buffer has no id.
    pub fn free(&mut self, server: &Server) -> Result<()> {
        if let Some(id) = self.id {
            reply::check(server.send_sync(BufferFree::new(id))?)?;
            self.id = None;
        }
        Ok(())
    }
}

fn allocate(server: &Server, allocation: Allocation, data: &[f32]) -> Result<i32> {
    let capacity = i64::from(allocation.channels) * i64::from(allocation.frames);
    // Sample offsets in /b_setn are i32.
    if capacity > i64::from(i32::MAX) {
        return Err(Error::InvalidConfiguration(
            "buffer holds more samples than can be addressed",
        ));
    }
    if data.len() as i64 > capacity {
        return Err(Error::InvalidConfiguration(
            "more samples than the buffer can hold",
        ));
    }

    let id = alloc::buffer_id(server)?;
    reply::check(server.send_sync(
        BufferAllocate::new(id, allocation.frames).number_of_channels(allocation.channels),
    )?)?;

    if !data.is_empty() {
        for (index, chunk) in data.chunks(SAMPLES_PER_MESSAGE).enumerate() {
            let offset = (index * SAMPLES_PER_MESSAGE) as i32;
            server.send(BufferSetRange::new(id, offset, chunk))?;
        }
        // /b_setn has no reply of its own.
        server.sync()?;
    }
    Ok(id)
}

fn read(server: &Server, path: &Path, transcoder: &dyn Transcoder) -> Result<i32> {
    if !path.exists() {
        return Err(Error::PathNotFound(path.to_owned()));
    }
    let path = if is_native_format(path) {
        path.to_owned()
    } else {
        transcoder.transcode(path)?
    };

    let id = alloc::buffer_id(server)?;
    reply::check(server.send_sync(BufferAllocateRead::new(
        id,
        path.to_string_lossy().into_owned(),
    ))?)?;
    Ok(id)
}

/// Queries the server about buffers.
///
/// Returns one [`BufferInfo`] per buffer number, in the order the server lists them. Unallocated
/// buffers report zero frames and channels.
pub fn query(server: &Server, ids: impl IntoIterator<Item = i32>) -> Result<Vec<BufferInfo>> {
    let reply = reply::check(server.send_sync(BufferQuery::new(ids))?)?;
    BufferInfo::parse_all(&reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_native_formats() {
        assert!(is_native_format(Path::new("/samples/kick.wav")));
        assert!(is_native_format(Path::new("/samples/KICK.AIFF")));
        assert!(is_native_format(Path::new("pad.flac")));
        assert!(!is_native_format(Path::new("loop.mp3")));
        assert!(!is_native_format(Path::new("noextension")));
    }

    #[test]
    fn test_ffmpeg_output_path() {
        let ffmpeg = Ffmpeg::new("/tmp/cache");
        assert_eq!(
            ffmpeg.output_path(Path::new("/music/loop.mp3")),
            PathBuf::from("/tmp/cache/loop.wav")
        );
    }

    #[test]
    fn test_from_spec() {
        assert_eq!(
            Buffer::from_spec(BufferSpec {
                allocate: Some(Allocation {
                    channels: 2,
                    frames: 512
                }),
                ..BufferSpec::default()
            })
            .unwrap(),
            Buffer::allocate(2, 512)
        );
        assert_eq!(
            Buffer::from_spec(BufferSpec {
                id: Some(3),
                ..BufferSpec::default()
            })
            .unwrap()
            .id(),
            Some(3)
        );
        assert!(matches!(
            Buffer::from_spec(BufferSpec::default()),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
