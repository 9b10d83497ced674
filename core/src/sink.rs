/*
 * sink.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, a command-line mail submission tool.
 *
 * Postino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Postino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Postino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Message sinks: append-only buffers the composer writes into and the transport reads back.
//!
//! Small messages stay in memory; messages estimated at or above [`SPOOL_THRESHOLD`] are spooled to a
//! randomly named temporary file that is removed when the sink is dropped.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::MailError;

/// Estimated sizes at or above this go to a temporary file (10 MiB).
pub const SPOOL_THRESHOLD: u64 = 10 << 20;

/// Which buffer type backs a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    Memory,
    TempFile,
}

impl Backing {
    /// Pure bucket choice: the 10 MiB boundary itself belongs to the temp-file bucket.
    pub fn for_estimate(estimate: u64) -> Self {
        if estimate >= SPOOL_THRESHOLD {
            Backing::TempFile
        } else {
            Backing::Memory
        }
    }
}

/// Append-only destination that can be rewound and read back from the start.
pub trait Sink: Write + Send {
    /// Rewind to offset zero and return a reader over everything written so far.
    fn rewind_reader(&mut self) -> io::Result<&mut (dyn Read + Send)>;

    fn backing(&self) -> Backing;
}

/// In-memory sink. Writes always append, even after a rewind.
#[derive(Debug, Default)]
pub struct MemorySink {
    data: Vec<u8>,
    read_pos: usize,
}

impl MemorySink {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            read_pos: 0,
        }
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for MemorySink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rest = &self.data[self.read_pos.min(self.data.len())..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.read_pos += n;
        Ok(n)
    }
}

impl Sink for MemorySink {
    fn rewind_reader(&mut self) -> io::Result<&mut (dyn Read + Send)> {
        self.read_pos = 0;
        Ok(self)
    }

    fn backing(&self) -> Backing {
        Backing::Memory
    }
}

/// Temporary-file sink. The file lives in the spool directory under a random name and is deleted on drop.
#[derive(Debug)]
pub struct SpoolFile {
    file: NamedTempFile,
}

impl SpoolFile {
    pub fn create_in(dir: &Path) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(".postino-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Write for SpoolFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let f: &mut File = self.file.as_file_mut();
        f.seek(SeekFrom::End(0))?;
        f.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.as_file_mut().flush()
    }
}

impl Sink for SpoolFile {
    fn rewind_reader(&mut self) -> io::Result<&mut (dyn Read + Send)> {
        let f = self.file.as_file_mut();
        f.flush()?;
        f.seek(SeekFrom::Start(0))?;
        Ok(f)
    }

    fn backing(&self) -> Backing {
        Backing::TempFile
    }
}

/// Pick and create the sink for a message of the given estimated size.
pub fn select_sink(estimate: u64, spool_dir: &Path) -> Result<Box<dyn Sink>, MailError> {
    match Backing::for_estimate(estimate) {
        Backing::TempFile => {
            let spool = SpoolFile::create_in(spool_dir).map_err(MailError::Compose)?;
            tracing::debug!(path = %spool.path().display(), estimate, "spooling message to temporary file");
            Ok(Box::new(spool))
        }
        Backing::Memory => Ok(Box::new(MemorySink::with_capacity(estimate as usize))),
    }
}
