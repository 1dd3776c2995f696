//! Manifest model: the list of files an install is made of.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use futures_util::StreamExt;
use gamescan_fetch::HttpClient;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameVersion {
    pub major:    u32,
    pub minor:    u32,
    pub build:    u32,
    pub revision: u32,
}

impl GameVersion {
    pub fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
    }
}

/// One file of the install.
///
/// `size`/`crc32` describe the file as it sits on disk; `bin_size`/`bin_crc32`
/// describe the artifact served at `http_link`, which may be compressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameFileInfo {
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "CRC32")]
    pub crc32:     u32,
    #[serde(rename = "Size")]
    pub size:      u64,
    #[serde(rename = "HttpLink")]
    pub http_link: String,
    #[serde(rename = "BinCRC32")]
    pub bin_crc32: u32,
    #[serde(rename = "BinSize")]
    pub bin_size:  u64,
}

impl GameFileInfo {
    /// `file_name` with either separator style mapped onto a platform path.
    pub fn relative_path(&self) -> PathBuf { self.file_name.split(['\\', '/']).filter(|s| !s.is_empty()).collect() }

    /// Whether the file lives below a directory rather than at the install root.
    pub fn is_nested(&self) -> bool { self.file_name.contains(['\\', '/']) }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.file_name.trim().is_empty() {
            return Err("entry with an empty FileName".into());
        }
        if self.http_link.trim().is_empty() {
            return Err(format!("{} has an empty HttpLink", self.file_name));
        }
        let relative = self.relative_path();
        let escapes = Path::new(&self.file_name).has_root()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(format!("{} escapes the install root", self.file_name));
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize)]
struct RawManifest {
    #[serde(rename = "Version")]
    version: GameVersion,
    #[serde(rename = "GameFileInfo")]
    files:   Vec<GameFileInfo>,
}

/// A manifest keyed by file name, compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawManifest", into = "RawManifest")]
pub struct GameFilesInfo {
    version: GameVersion,
    files:   BTreeMap<String, GameFileInfo>,
}

fn key(file_name: &str) -> String { file_name.to_lowercase() }

impl TryFrom<RawManifest> for GameFilesInfo {
    type Error = String;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, String> {
        let mut files = BTreeMap::new();
        for file in raw.files {
            file.validate()?;
            let name = file.file_name.clone();
            if files.insert(key(&name), file).is_some() {
                return Err(format!("duplicate entry {name}"));
            }
        }
        Ok(Self {
            version: raw.version,
            files,
        })
    }
}

impl From<GameFilesInfo> for RawManifest {
    fn from(info: GameFilesInfo) -> Self {
        Self {
            version: info.version,
            files:   info.files.into_values().collect(),
        }
    }
}

impl GameFilesInfo {
    pub fn new(version: GameVersion) -> Self {
        Self {
            version,
            files: BTreeMap::new(),
        }
    }

    /// Adds `file`, replacing any entry with the same name in another case.
    pub fn insert(&mut self, file: GameFileInfo) -> Option<GameFileInfo> { self.files.insert(key(&file.file_name), file) }

    pub fn version(&self) -> GameVersion { self.version }

    pub fn get(&self, file_name: &str) -> Option<&GameFileInfo> { self.files.get(&key(file_name)) }

    pub fn files(&self) -> impl ExactSizeIterator<Item = &GameFileInfo> { self.files.values() }

    pub fn len(&self) -> usize { self.files.len() }

    pub fn is_empty(&self) -> bool { self.files.is_empty() }

    /// Layers `other` on top: its entries replace same-named ones and its
    /// version wins.
    pub fn merge(&mut self, other: GameFilesInfo) {
        self.version = other.version;
        self.files.extend(other.files);
    }

    pub fn into_files(self) -> Vec<GameFileInfo> { self.files.into_values().collect() }

    pub fn from_json(origin: &str, json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::manifest(origin, e))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| Error::io(path, e))?;
        Self::from_json(&path.display().to_string(), &json)
    }

    /// Downloads and parses the manifest served at `url`.
    pub async fn fetch<C: HttpClient>(client: &C, url: &str) -> Result<Self> {
        let transport = |e: C::Error| Error::Fetch(gamescan_fetch::Error::Transport(e.to_string()));
        let mut stream = client.stream(url, &[]).await.map_err(transport)?;
        let mut body = Vec::new();
        while let Some(piece) = stream.next().await {
            body.extend_from_slice(&piece.map_err(transport)?);
        }
        let json = String::from_utf8(body).map_err(|e| Error::manifest(url, e))?;
        Self::from_json(url, &json)
    }
}
