//! Container sinks the controller writes into.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use parking_lot::Mutex;
use tracing::debug;

use crate::{EncodedSample, TrackFormat, TrackKind};

/// Magic bytes at the start of a framed container file.
const MAGIC: &[u8; 4] = b"SHMX";
const VERSION: u8 = 1;
const FLAG_KEYFRAME: u8 = 0x01;

/// Where the multiplexed tracks end up.
///
/// `start` is called once, when every track has registered; `finish` at most
/// once, after every track released. Writes only happen in between.
pub trait ContainerSink: Send {
    fn start(&mut self, formats: &[TrackFormat]) -> io::Result<()>;
    fn write(&mut self, track: usize, sample: &EncodedSample) -> io::Result<()>;
    fn finish(&mut self) -> io::Result<()>;
}

/// Everything written into a [`MemorySink`].
#[derive(Debug, Default)]
pub struct MemoryContainer {
    pub formats: Vec<TrackFormat>,
    pub samples: Vec<(usize, EncodedSample)>,
    pub started: bool,
    pub finished: bool,
}

/// Keeps the container in memory, shared with whoever holds a handle.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryContainer>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle to inspect the container while or after it is written.
    pub fn container(&self) -> Arc<Mutex<MemoryContainer>> {
        Arc::clone(&self.inner)
    }
}

impl ContainerSink for MemorySink {
    fn start(&mut self, formats: &[TrackFormat]) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.formats = formats.to_vec();
        inner.started = true;
        Ok(())
    }

    fn write(&mut self, track: usize, sample: &EncodedSample) -> io::Result<()> {
        self.inner.lock().samples.push((track, sample.clone()));
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.lock().finished = true;
        Ok(())
    }
}

/// Writes a framed container file.
///
/// The file is only created once the container opens. Layout, big-endian:
/// magic, version, track count, then per track `kind:u8, bitrate:u64,
/// mime_len:u16, mime`; then per sample `track:u8, flags:u8, pts_us:u64,
/// len:u32, payload`.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "container not started"))
    }
}

impl ContainerSink for FileSink {
    fn start(&mut self, formats: &[TrackFormat]) -> io::Result<()> {
        let track_count = u8::try_from(formats.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many tracks"))?;

        let mut header = BytesMut::new();
        header.put_slice(MAGIC);
        header.put_u8(VERSION);
        header.put_u8(track_count);
        for format in formats {
            let mime = format.mime.as_bytes();
            let mime_len = u16::try_from(mime.len())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "mime too long"))?;
            header.put_u8(match format.kind {
                TrackKind::Video => 0,
                TrackKind::Audio => 1,
            });
            header.put_u64(format.bitrate_bps);
            header.put_u16(mime_len);
            header.put_slice(mime);
        }

        let mut writer = BufWriter::new(File::create(&self.path)?);
        writer.write_all(&header)?;
        debug!(path = %self.path.display(), tracks = formats.len(), "Container file created");
        self.writer = Some(writer);
        Ok(())
    }

    fn write(&mut self, track: usize, sample: &EncodedSample) -> io::Result<()> {
        let track = u8::try_from(track)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "track index out of range"))?;
        let len = u32::try_from(sample.data.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "sample too large"))?;

        let mut frame = BytesMut::with_capacity(14 + sample.data.len());
        frame.put_u8(track);
        frame.put_u8(if sample.is_keyframe { FLAG_KEYFRAME } else { 0 });
        frame.put_u64(sample.pts_us);
        frame.put_u32(len);
        frame.put_slice(&sample.data);

        self.writer()?.write_all(&frame)
    }

    fn finish(&mut self) -> io::Result<()> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "container not started"))?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }
}
