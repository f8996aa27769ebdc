//! Append-only, file-backed name dictionary.
//!
//! Layout: `b"STBD" | version | (varint len, utf8 bytes)*`. The record index
//! (1-based) is the name id, so replaying the log reproduces every id.

use super::memory::MemoryNameDictionary;
use super::{DictionaryStorage, NameDictionary};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use stubscope_plugin::varint::{decode_varint, encode_varint};

const MAGIC: &[u8; 4] = b"STBD";
const VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 1;

pub struct FileNameDictionary {
    path: PathBuf,
    names: MemoryNameDictionary,
    writer: Mutex<Option<BufWriter<File>>>,
    dirty: AtomicBool,
}

impl FileNameDictionary {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let names = MemoryNameDictionary::new();
        if path.exists() {
            let bytes = fs::read(path)?;
            replay(&bytes, &names)?;
        } else {
            let mut header = Vec::with_capacity(HEADER_LEN);
            header.extend_from_slice(MAGIC);
            header.push(VERSION);
            fs::write(path, header)?;
        }

        let file = OpenOptions::new().append(true).open(path)?;
        tracing::debug!(
            "Opened name dictionary {} ({} names)",
            path.display(),
            names.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            names,
            writer: Mutex::new(Some(BufWriter::new(file))),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn replay(bytes: &[u8], names: &MemoryNameDictionary) -> io::Result<()> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(invalid_data("bad dictionary header"));
    }
    if bytes[MAGIC.len()] != VERSION {
        return Err(invalid_data(format!(
            "unsupported dictionary version {}",
            bytes[MAGIC.len()]
        )));
    }

    let mut pos = HEADER_LEN;
    let mut expected_id = 1u32;
    while pos < bytes.len() {
        let len = decode_varint(bytes, &mut pos)
            .map_err(|e| invalid_data(format!("torn record at {}: {}", pos, e)))?
            as usize;
        let record = pos
            .checked_add(len)
            .and_then(|end| bytes.get(pos..end))
            .ok_or_else(|| invalid_data(format!("torn record at {}", pos)))?;
        let name = std::str::from_utf8(record)
            .map_err(|_| invalid_data(format!("invalid utf-8 at {}", pos)))?;
        if names.intern(name) != expected_id {
            return Err(invalid_data(format!("duplicate name record {:?}", name)));
        }
        expected_id += 1;
        pos += len;
    }
    Ok(())
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

impl NameDictionary for FileNameDictionary {
    fn enumerate(&self, name: &str) -> io::Result<u32> {
        if let Some(id) = self.names.id_of(name) {
            return Ok(id);
        }

        let mut writer = self.writer.lock();
        // Another writer may have won the race while we waited.
        if let Some(id) = self.names.id_of(name) {
            return Ok(id);
        }
        let writer = writer
            .as_mut()
            .ok_or_else(|| io::Error::other("name dictionary is closed"))?;

        let mut record = Vec::with_capacity(name.len() + 2);
        encode_varint(name.len() as u64, &mut record);
        record.extend_from_slice(name.as_bytes());
        writer.write_all(&record)?;
        self.dirty.store(true, Ordering::Release);

        Ok(self.names.intern(name))
    }

    fn value_of(&self, id: u32) -> io::Result<Option<Arc<str>>> {
        Ok(self.names.resolve(id))
    }

    fn len(&self) -> usize {
        self.names.len()
    }

    fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn flush(&self) -> io::Result<()> {
        let mut writer = self.writer.lock();
        if let Some(writer) = writer.as_mut() {
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }
        self.dirty.store(false, Ordering::Release);
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        if let Some(mut writer) = self.writer.lock().take() {
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }
        self.dirty.store(false, Ordering::Release);
        Ok(())
    }
}

/// Dictionary stored at a fixed path. Auxiliary files share the file name as prefix.
#[derive(Debug, Clone)]
pub struct FileDictionaryStorage {
    path: PathBuf,
}

impl FileDictionaryStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DictionaryStorage for FileDictionaryStorage {
    fn open(&self) -> io::Result<Arc<dyn NameDictionary>> {
        Ok(Arc::new(FileNameDictionary::open(&self.path)?))
    }

    fn destroy(&self) -> io::Result<()> {
        let Some(prefix) = self.path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return Ok(());
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
