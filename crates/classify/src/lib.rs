use std::fs;
use std::path::Path;

use mime_guess::mime;
use walkdir::WalkDir;

// Container/codec formats commonly missing from generic MIME tables.
const AUDIO_FALLBACK_EXTS: &[&str] = &["ape", "wv", "ac3", "caf", "m4b", "tta", "voc", "wma"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Audio,
    Image,
    Cue,
    Log,
    Misc,
}

// Never fails: anything unrecognized is Misc.
pub fn classify(path: &Path) -> FileKind {
    if is_audio(path) {
        return FileKind::Audio;
    }
    if is_image(path) {
        return FileKind::Image;
    }
    match path.extension().and_then(|s| s.to_str()) {
        Some("cue") => FileKind::Cue,
        Some("log") => FileKind::Log,
        _ => FileKind::Misc,
    }
}

pub fn is_audio(path: &Path) -> bool {
    // MIME tables file playlists under audio/*; they are never audio here.
    if is_playlist(path) {
        return false;
    }
    if let Some(guess) = mime_guess::from_path(path).first() {
        if guess.type_() == mime::AUDIO {
            return true;
        }
    }
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            AUDIO_FALLBACK_EXTS.iter().any(|e| *e == ext)
        }
        None => false,
    }
}

pub fn is_image(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .map(|guess| guess.type_() == mime::IMAGE)
        .unwrap_or(false)
}

pub fn is_companion_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("cue") | Some("log")
    )
}

// Pairs an audio file with sibling .cue/.log files sharing its base name,
// in both directions. The base name strips only the single trailing
// extension.
pub fn is_audio_companion(path: &Path) -> bool {
    let parent = match path.parent() {
        Some(parent) => parent,
        None => return false,
    };
    let stem = match path.file_stem() {
        Some(stem) => stem,
        None => return false,
    };

    if is_audio(path) {
        for ext in ["cue", "log"] {
            let mut sibling = stem.to_os_string();
            sibling.push(".");
            sibling.push(ext);
            if parent.join(&sibling).exists() {
                return true;
            }
        }
        return false;
    }

    if !is_companion_file(path) {
        return false;
    }

    let entries = match fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(_) => return false,
    };
    for entry in entries.flatten() {
        let sibling = entry.path();
        if sibling == path {
            continue;
        }
        if sibling.file_stem() == Some(stem) && is_audio(&sibling) {
            return true;
        }
    }
    false
}

pub fn is_playlist(path: &Path) -> bool {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().to_ascii_lowercase(),
        None => return false,
    };
    name.ends_with(".m3u") || name.ends_with(".m3u8")
}

// True iff dir directly owns at least one audio file and no audio file
// sits deeper in its subtree. A file path is never a folder.
pub fn is_deepest_audio_folder(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }

    let mut owns_audio = false;
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if !is_audio(entry.path()) {
            continue;
        }
        if entry.depth() == 1 {
            owns_audio = true;
        } else {
            return false;
        }
    }
    owns_audio
}

#[cfg(test)]
mod tests {
    use super::{
        classify, is_audio, is_audio_companion, is_companion_file, is_deepest_audio_folder,
        is_image, is_playlist, FileKind,
    };
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn recognized_audio_extensions_are_audio() {
        for name in [
            "t.mp3", "t.flac", "t.ogg", "t.ape", "t.wv", "t.ac3", "t.caf", "t.m4b", "t.tta",
            "t.voc", "t.wma",
        ] {
            assert!(is_audio(Path::new(name)), "{} should be audio", name);
        }
        assert!(is_audio(Path::new("t.MP3")));
        assert!(is_audio(Path::new("t.APE")));
    }

    #[test]
    fn playlists_are_never_audio() {
        assert!(!is_audio(Path::new("track.m3u")));
        assert!(!is_audio(Path::new("track.m3u8")));
        assert!(!is_audio(Path::new("track.M3U8")));
        assert!(!is_audio_companion(Path::new("track.m3u")));
    }

    #[test]
    fn playlist_matching_is_end_anchored() {
        assert!(is_playlist(Path::new("f3.m3u")));
        assert!(is_playlist(Path::new(".m3u")));
        assert!(is_playlist(Path::new(".m3u8")));
        assert!(is_playlist(Path::new("f4.m3u8")));
        assert!(is_playlist(Path::new("nested/f5.M3U8")));
        assert!(!is_playlist(Path::new("f1")));
        assert!(!is_playlist(Path::new("f2.")));
        assert!(!is_playlist(Path::new("f6.m3")));
        assert!(!is_playlist(Path::new("f7.m3uq")));
        assert!(!is_playlist(Path::new("m3u")));
    }

    #[test]
    fn companion_extensions_are_literal_lowercase() {
        assert!(is_companion_file(Path::new("a.cue")));
        assert!(is_companion_file(Path::new("a.log")));
        assert!(!is_companion_file(Path::new("a.CUE")));
        assert!(!is_companion_file(Path::new("a.LOG")));
        assert!(!is_companion_file(Path::new("a.txt")));
        assert!(!is_companion_file(Path::new("a")));
    }

    #[test]
    fn companion_detection_is_symmetric() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("album.flac"), b"x").unwrap();
        fs::write(dir.path().join("album.cue"), b"x").unwrap();
        fs::write(dir.path().join("album.log"), b"x").unwrap();
        fs::write(dir.path().join("album2.flac"), b"x").unwrap();

        assert!(is_audio_companion(&dir.path().join("album.flac")));
        assert!(is_audio_companion(&dir.path().join("album.cue")));
        assert!(is_audio_companion(&dir.path().join("album.log")));
        assert!(!is_audio_companion(&dir.path().join("album2.flac")));
    }

    #[test]
    fn lone_audio_file_has_no_companion() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("track.mp3"), b"x").unwrap();
        assert!(!is_audio_companion(&dir.path().join("track.mp3")));
    }

    #[test]
    fn unmatched_cue_has_no_companion() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.cue"), b"x").unwrap();
        fs::write(dir.path().join("b.flac"), b"x").unwrap();
        assert!(!is_audio_companion(&dir.path().join("a.cue")));
    }

    #[test]
    fn unknown_types_classify_as_misc() {
        assert_eq!(classify(Path::new("notes.txt")), FileKind::Misc);
        assert_eq!(classify(Path::new("README")), FileKind::Misc);
        assert_eq!(classify(Path::new("data.xyz123")), FileKind::Misc);
        assert_eq!(classify(Path::new("rip.cue")), FileKind::Cue);
        assert_eq!(classify(Path::new("rip.log")), FileKind::Log);
        assert_eq!(classify(Path::new("cover.png")), FileKind::Image);
        assert_eq!(classify(Path::new("track.flac")), FileKind::Audio);
    }

    #[test]
    fn images_are_sniffed_by_mime_category() {
        assert!(is_image(Path::new("cover.png")));
        assert!(is_image(Path::new("folder.jpg")));
        assert!(is_image(Path::new("scan.jpeg")));
        assert!(!is_image(Path::new("track.flac")));
        assert!(!is_image(Path::new("notes.txt")));
    }

    #[test]
    fn deepest_audio_folder_requires_directly_owned_audio() {
        let dir = tempdir().unwrap();
        let album = dir.path().join("album");
        fs::create_dir_all(&album).unwrap();
        fs::write(album.join("track.mp3"), b"x").unwrap();
        assert!(is_deepest_audio_folder(&album));

        // audio deeper in the tree disqualifies the parent
        let parent = dir.path().join("artist");
        let child = parent.join("album");
        fs::create_dir_all(&child).unwrap();
        fs::write(parent.join("loose.mp3"), b"x").unwrap();
        fs::write(child.join("track.mp3"), b"x").unwrap();
        assert!(!is_deepest_audio_folder(&parent));
        assert!(is_deepest_audio_folder(&child));
    }

    #[test]
    fn deepest_audio_folder_is_false_for_files_and_audioless_dirs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("track.mp3"), b"x").unwrap();
        assert!(!is_deepest_audio_folder(&dir.path().join("track.mp3")));

        let empty = dir.path().join("empty");
        fs::create_dir_all(&empty).unwrap();
        assert!(!is_deepest_audio_folder(&empty));
    }
}
