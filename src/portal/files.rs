//! File browser API scoped to a single root directory.
//!
//! Paths on the wire are root-relative (`/`, `/notes/todo.txt`). Anything
//! with a `..` component is refused before touching the filesystem.

use std::fs::Metadata;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path as FsPath, PathBuf};
use std::time::SystemTime;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::FilesConfig;
use crate::http::server::AppState;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("File too large")]
    TooLarge,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Io(#[from] io::Error),
}

impl IntoResponse for FileError {
    fn into_response(self) -> Response {
        let status = match &self {
            FileError::InvalidPath(_) | FileError::TooLarge => StatusCode::BAD_REQUEST,
            FileError::NotFound(_) => StatusCode::NOT_FOUND,
            FileError::Io(e) if e.kind() == io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            FileError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub mod_time: String,
    pub mode: String,
}

#[derive(Debug, Serialize)]
pub struct Listing {
    pub path: String,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub path: String,
    pub content: String,
    pub size: u64,
    pub mod_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Dir,
    File,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    #[serde(rename = "newPath")]
    pub new_path: String,
}

/// Filesystem operations confined to `root`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    max_read_bytes: u64,
}

impl FileStore {
    pub fn new(config: &FilesConfig) -> Self {
        Self {
            root: config.root.clone(),
            max_read_bytes: config.max_read_bytes,
        }
    }

    /// Map a wire path onto the filesystem, returning it with its
    /// normalized wire form.
    fn resolve(&self, wire: &str) -> Result<(PathBuf, String), FileError> {
        let mut relative = PathBuf::new();
        for component in FsPath::new(wire.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                _ => return Err(FileError::InvalidPath(wire.to_string())),
            }
        }
        let shown = format!("/{}", relative.to_string_lossy());
        Ok((self.root.join(relative), shown))
    }

    pub async fn list(&self, wire: &str) -> Result<Listing, FileError> {
        let (dir, shown) = self.resolve(wire)?;
        let mut entries = tokio::fs::read_dir(&dir).await?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            files.push(FileEntry {
                path: join_wire(&shown, &name),
                name,
                is_dir: meta.is_dir(),
                size: meta.len(),
                mod_time: format_time(meta.modified().ok()),
                mode: mode_string(&meta),
            });
        }
        files.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

        Ok(Listing {
            path: shown,
            files,
        })
    }

    pub async fn create(&self, parent: &str, request: &CreateRequest) -> Result<(), FileError> {
        let (target, shown) = self.resolve(&join_wire(parent, &request.name))?;
        if shown == "/" {
            return Err(FileError::InvalidPath(request.name.clone()));
        }
        match request.kind {
            EntryKind::Dir => tokio::fs::create_dir_all(&target).await?,
            EntryKind::File => {
                tokio::fs::File::create(&target).await?;
            }
        }
        tracing::info!(path = %shown, kind = ?request.kind, "Created entry");
        Ok(())
    }

    pub async fn remove(&self, wire: &str) -> Result<(), FileError> {
        let (target, shown) = self.resolve(wire)?;
        if shown == "/" {
            return Err(FileError::InvalidPath("refusing to delete the root".into()));
        }
        let meta = tokio::fs::symlink_metadata(&target)
            .await
            .map_err(|_| FileError::NotFound(shown.clone()))?;
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&target).await?;
        } else {
            tokio::fs::remove_file(&target).await?;
        }
        tracing::info!(path = %shown, "Removed entry");
        Ok(())
    }

    pub async fn read(&self, wire: &str) -> Result<FileContent, FileError> {
        let (target, shown) = self.resolve(wire)?;
        let meta = tokio::fs::metadata(&target)
            .await
            .map_err(|_| FileError::NotFound(shown.clone()))?;
        if meta.len() > self.max_read_bytes {
            return Err(FileError::TooLarge);
        }
        let bytes = tokio::fs::read(&target).await?;
        Ok(FileContent {
            path: shown,
            content: String::from_utf8_lossy(&bytes).into_owned(),
            size: meta.len(),
            mod_time: format_time(meta.modified().ok()),
        })
    }

    pub async fn write(&self, wire: &str, content: &str) -> Result<(), FileError> {
        let (target, shown) = self.resolve(wire)?;
        tokio::fs::write(&target, content).await?;
        tracing::debug!(path = %shown, bytes = content.len(), "Wrote file");
        Ok(())
    }

    pub async fn rename(&self, wire: &str, new_wire: &str) -> Result<(), FileError> {
        let (from, from_display) = self.resolve(wire)?;
        let (to, to_display) = self.resolve(new_wire)?;
        tokio::fs::rename(&from, &to).await?;
        tracing::info!(from = %from_display, to = %to_display, "Renamed entry");
        Ok(())
    }
}

fn join_wire(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name)
}

fn format_time(time: Option<SystemTime>) -> String {
    time.map(|t| DateTime::<Local>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// `ls -l` style mode, e.g. `drwxr-xr-x`.
fn mode_string(meta: &Metadata) -> String {
    let kind = if meta.is_dir() {
        'd'
    } else if meta.file_type().is_symlink() {
        'L'
    } else {
        '-'
    };
    let bits = meta.permissions().mode();
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let triple = (bits >> shift) & 0o7;
        out.push(if triple & 0o4 != 0 { 'r' } else { '-' });
        out.push(if triple & 0o2 != 0 { 'w' } else { '-' });
        out.push(if triple & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

fn ok() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_root(State(state): State<AppState>) -> Result<Json<Listing>, FileError> {
    state.files.list("/").await.map(Json)
}

pub async fn list_dir(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<Listing>, FileError> {
    state.files.list(&path).await.map(Json)
}

pub async fn create_in_root(
    State(state): State<AppState>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<Value>, FileError> {
    state.files.create("/", &request).await.map(|_| ok())
}

pub async fn create_entry(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<Value>, FileError> {
    state.files.create(&path, &request).await.map(|_| ok())
}

pub async fn remove_entry(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<Value>, FileError> {
    state.files.remove(&path).await.map(|_| ok())
}

pub async fn read_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<FileContent>, FileError> {
    state.files.read(&path).await.map(Json)
}

pub async fn write_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(request): Json<WriteRequest>,
) -> Result<Json<Value>, FileError> {
    state.files.write(&path, &request.content).await.map(|_| ok())
}

pub async fn rename_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<Value>, FileError> {
    state.files.rename(&path, &request.new_path).await.map(|_| ok())
}
