//! Local directory source
//!
//! Every file under the directory whose extension a codec claims becomes one
//! or more tracks. Track ids are `"<n>-<path>"` where `n` is the index of the
//! song inside the file.

use super::{Catalog, Source};
use crate::codec::{default_registry, Song};
use crate::error::{Error, Result};
use async_trait::async_trait;
use jukebox_common::SongInfo;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const KIND: &str = "file";
pub const PARAMS: &[&str] = &["directory"];

/// Registry constructor
pub fn create(params: &[String]) -> Result<Arc<dyn Source>> {
    let directory = params
        .first()
        .ok_or_else(|| Error::BadRequest("file source needs a directory".to_string()))?;
    Ok(Arc::new(FileSource::new(Path::new(directory))?))
}

/// Songs found under one directory
pub struct FileSource {
    root: PathBuf,
    songs: RwLock<BTreeMap<String, SongInfo>>,
}

impl FileSource {
    /// The directory must exist; it is stored as an absolute path
    pub fn new(directory: &Path) -> Result<Self> {
        let root = std::fs::canonicalize(directory).map_err(|e| {
            Error::BadRequest(format!("cannot open directory {}: {}", directory.display(), e))
        })?;
        if !root.is_dir() {
            return Err(Error::BadRequest(format!("not a directory: {}", root.display())));
        }
        if root.to_string_lossy().contains(jukebox_common::song::SONG_ID_DELIMITER) {
            return Err(Error::BadRequest(format!(
                "directory name may not contain '{}': {}",
                jukebox_common::song::SONG_ID_DELIMITER,
                root.display()
            )));
        }
        Ok(Self {
            root,
            songs: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cached(&self) -> BTreeMap<String, SongInfo> {
        match self.songs.read() {
            Ok(songs) => songs.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, songs: BTreeMap<String, SongInfo>) {
        match self.songs.write() {
            Ok(mut guard) => *guard = songs,
            Err(poisoned) => *poisoned.into_inner() = songs,
        }
    }
}

/// Split a track id into song index and file path
pub fn parse_track_id(track: &str) -> Result<(usize, PathBuf)> {
    let (num, path) = track
        .split_once('-')
        .ok_or_else(|| Error::InvalidSongId(format!("bad file track id: {}", track)))?;
    let num = num
        .parse::<usize>()
        .map_err(|_| Error::InvalidSongId(format!("bad file track id: {}", track)))?;
    Ok((num, PathBuf::from(path)))
}

/// Walk `root` and collect metadata for every decodable song
fn scan(root: &Path) -> BTreeMap<String, SongInfo> {
    let registry = default_registry();
    let mut songs = BTreeMap::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let decoded = match registry.decode_by_extension(path) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let count = decoded.len();
        for (n, song) in decoded.iter().enumerate() {
            let mut info = song.info();
            if info.title.is_empty() {
                info.title = file_name(path);
                if count != 1 {
                    info.title.push_str(&format!(":{}", n));
                }
            }
            if info.album.is_empty() {
                info.album = path.parent().map(file_name).unwrap_or_default();
            }
            songs.insert(format!("{}-{}", n, path.display()), info);
        }
    }
    songs
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl Source for FileSource {
    fn key(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }

    async fn list(&self) -> Result<Catalog> {
        let songs = self.cached();
        if songs.is_empty() {
            return self.refresh().await;
        }
        Ok(Catalog {
            songs,
            playlists: BTreeMap::new(),
        })
    }

    async fn refresh(&self) -> Result<Catalog> {
        let root = self.root.clone();
        let songs = tokio::task::spawn_blocking(move || scan(&root))
            .await
            .map_err(|e| Error::Internal(format!("scan task failed: {}", e)))?;
        info!("Scanned {}: {} songs", self.root.display(), songs.len());

        self.store(songs.clone());
        Ok(Catalog {
            songs,
            playlists: BTreeMap::new(),
        })
    }

    fn info(&self, track: &str) -> Result<SongInfo> {
        let songs = match self.songs.read() {
            Ok(songs) => songs,
            Err(poisoned) => poisoned.into_inner(),
        };
        songs
            .get(track)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("could not find {}", track)))
    }

    fn get_song(&self, track: &str) -> Result<Box<dyn Song>> {
        let (num, path) = parse_track_id(track)?;
        let escapes = path.components().any(|c| c == Component::ParentDir);
        if escapes || !path.starts_with(&self.root) {
            return Err(Error::NotFound(format!("{} is outside {}", path.display(), self.root.display())));
        }
        let mut songs = default_registry().decode_by_extension(&path)?;
        if num >= songs.len() {
            return Err(Error::NotFound(format!("no song {} in {}", num, path.display())));
        }
        Ok(songs.swap_remove(num))
    }
}
