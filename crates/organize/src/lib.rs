use std::fs;
use std::path::{Path, PathBuf};

use classify::FileKind;
use common::{relpath_from, FolderNames};
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

const MAX_RENAME_ATTEMPTS: u32 = 100;

#[derive(Debug)]
pub enum OrganizeError {
    Io(std::io::Error),
    MissingFolder(PathBuf),
    MissingName(PathBuf),
}

impl std::fmt::Display for OrganizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrganizeError::Io(err) => write!(f, "io error: {}", err),
            OrganizeError::MissingFolder(path) => {
                write!(f, "folder does not exist: {:?}", path)
            }
            OrganizeError::MissingName(path) => {
                write!(f, "path has no final name component: {:?}", path)
            }
        }
    }
}

impl std::error::Error for OrganizeError {}

impl From<std::io::Error> for OrganizeError {
    fn from(err: std::io::Error) -> Self {
        OrganizeError::Io(err)
    }
}

#[derive(Debug)]
pub struct AlbumOutcome {
    pub path: PathBuf,
    pub result: Result<(), OrganizeError>,
}

#[derive(Clone, Debug)]
pub struct BeautifyStats {
    pub albums: usize,
    pub failed: usize,
}

pub fn stats(outcomes: &[AlbumOutcome]) -> BeautifyStats {
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    BeautifyStats {
        albums: outcomes.len(),
        failed,
    }
}

// Moves a file or directory into target_dir, renaming on collision.
// Returns the path the source ended up at.
pub fn move_with_rename(source: &Path, target_dir: &Path) -> Result<PathBuf, OrganizeError> {
    fs::create_dir_all(target_dir)?;
    let name = source
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| OrganizeError::MissingName(source.to_path_buf()))?;

    let direct = target_dir.join(&name);
    if !direct.exists() {
        fs::rename(source, &direct)?;
        return Ok(direct);
    }

    for attempt in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = target_dir.join(numbered_name(&name, attempt));
        if !candidate.exists() {
            fs::rename(source, &candidate)?;
            return Ok(candidate);
        }
    }

    // all numbered candidates taken; a random name cannot collide but
    // loses the original
    let fallback = target_dir.join(fallback_name(&name));
    warn!(
        "Rename attempts exhausted for {:?}; moving to {:?}",
        source, fallback
    );
    fs::rename(source, &fallback)?;
    Ok(fallback)
}

fn numbered_name(name: &str, attempt: u32) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());
    match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, attempt, ext.to_string_lossy()),
        None => format!("{} ({})", stem, attempt),
    }
}

fn fallback_name(name: &str) -> String {
    match Path::new(name).extension() {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_string_lossy()),
        None => Uuid::new_v4().to_string(),
    }
}

// Finds or creates name under parent and normalizes its casing. An
// existing child differing only by ASCII case is reused, not shadowed by
// a second folder.
pub fn ensure_canonical_subfolder(parent: &Path, name: &str) -> Result<PathBuf, OrganizeError> {
    let path = match find_child_ignore_case(parent, name) {
        Some(existing) => existing,
        None => {
            let path = parent.join(name);
            fs::create_dir_all(&path)?;
            path
        }
    };
    canonicalize_folder_case(&path)
}

fn find_child_ignore_case(parent: &Path, name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(parent).ok()?;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().eq_ignore_ascii_case(name) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            return Some(path);
        }
    }
    None
}

// Renames a folder to canonical case (first character uppercased, rest
// lowercased). The caller must have ensured the folder exists.
pub fn canonicalize_folder_case(path: &Path) -> Result<PathBuf, OrganizeError> {
    if !path.exists() {
        return Err(OrganizeError::MissingFolder(path.to_path_buf()));
    }
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| OrganizeError::MissingName(path.to_path_buf()))?;
    let canonical = canonical_case(&name);
    if name == canonical {
        return Ok(path.to_path_buf());
    }

    // a case-only rename collides with its own source on case-insensitive
    // filesystems; go through a unique temporary name
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
    fs::rename(path, &tmp)?;
    let target = parent.join(&canonical);
    fs::rename(&tmp, &target)?;
    Ok(target)
}

fn canonical_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

// Snapshot of the deepest audio folders under root, sorted.
pub fn find_album_dirs(root: &Path) -> Vec<PathBuf> {
    let mut album_dirs = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_dir() {
            continue;
        }
        if classify::is_deepest_audio_folder(entry.path()) {
            album_dirs.push(entry.path().to_path_buf());
        }
    }
    album_dirs.sort();
    album_dirs
}

pub fn beautify_album(album: &Path, names: &FolderNames) -> Result<(), OrganizeError> {
    let artwork = ensure_canonical_subfolder(album, &names.artwork)?;
    for image in image_files(album, &artwork) {
        move_with_rename(&image, &artwork)?;
    }

    let misc = ensure_canonical_subfolder(album, &names.misc)?;
    for child in misc_candidates(album, &artwork, &misc)? {
        move_with_rename(&child, &misc)?;
    }

    remove_playlists(album)?;
    prune_empty_dirs(album)?;
    Ok(())
}

// Image files anywhere under the album, except those already filed under
// the artwork folder. Listed in full before any move is issued.
fn image_files(album: &Path, artwork: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(album)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if path.starts_with(artwork) {
            continue;
        }
        if entry.file_type().is_file() && classify::is_image(path) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}

// Direct children of the album root that belong in the misc folder:
// files that are not audio, not audio companions, and not images, plus
// every directory other than the artwork/misc folders themselves.
// Classification runs over the full listing before anything moves, so it
// never observes the mover's edits.
fn misc_candidates(
    album: &Path,
    artwork: &Path,
    misc: &Path,
) -> Result<Vec<PathBuf>, OrganizeError> {
    let mut children = Vec::new();
    for entry in fs::read_dir(album)?.flatten() {
        let path = entry.path();
        if path == artwork || path == misc {
            continue;
        }
        children.push(path);
    }
    children.sort();

    let mut to_move = Vec::new();
    for child in children {
        if child.is_dir() {
            to_move.push(child);
            continue;
        }
        let keep = match classify::classify(&child) {
            FileKind::Audio | FileKind::Image => true,
            FileKind::Cue | FileKind::Log => classify::is_audio_companion(&child),
            FileKind::Misc => false,
        };
        if !keep {
            to_move.push(child);
        }
    }
    Ok(to_move)
}

pub fn remove_playlists(album: &Path) -> Result<(), OrganizeError> {
    let mut playlists = Vec::new();
    for entry in WalkDir::new(album)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.file_type().is_file() && classify::is_playlist(entry.path()) {
            playlists.push(entry.path().to_path_buf());
        }
    }
    for playlist in playlists {
        fs::remove_file(&playlist)?;
    }
    Ok(())
}

pub fn prune_empty_dirs(album: &Path) -> Result<(), OrganizeError> {
    for entry in WalkDir::new(album)
        .follow_links(false)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_dir() {
            continue;
        }
        if fs::read_dir(entry.path())?.next().is_none() {
            fs::remove_dir(entry.path())?;
        }
    }
    Ok(())
}

// Beautifies every album under root. A failure aborts only the album it
// occurred in; the remaining albums still run.
pub fn beautify_library(root: &Path, names: &FolderNames) -> Vec<AlbumOutcome> {
    let album_dirs = find_album_dirs(root);
    info!("Found {} album folders", album_dirs.len());

    let mut outcomes = Vec::with_capacity(album_dirs.len());
    for album in album_dirs {
        let rel = relpath_from(root, &album)
            .filter(|rel| !rel.is_empty())
            .unwrap_or_else(|| album.display().to_string());
        info!("Beautifying {}", rel);
        let result = beautify_album(&album, names);
        if let Err(err) = &result {
            warn!("Failed to beautify {}: {}", rel, err);
        }
        outcomes.push(AlbumOutcome {
            path: album,
            result,
        });
    }
    outcomes
}
