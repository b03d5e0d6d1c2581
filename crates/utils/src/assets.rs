use std::{
    env, io,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;

const ASSET_DIR_ENV: &str = "REEL_ASSET_DIR";

/// Standard asset layout
/// ```text
/// <asset dir>/
/// ├── music/        # background.mp3 (or .wav, .m4a, ...) picked up automatically
/// └── output/       # rendered videos and their _script.txt files
/// ```
pub mod layout {
    pub const MUSIC_DIR: &str = "music";
    pub const OUTPUT_DIR: &str = "output";
    pub const BACKGROUND_STEM: &str = "background";
}

const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "wav", "m4a", "aac", "ogg", "flac"];

/// `$REEL_ASSET_DIR`, else the platform data directory. Created if missing.
pub fn asset_dir() -> io::Result<PathBuf> {
    let path = if let Ok(custom_dir) = env::var(ASSET_DIR_ENV) {
        PathBuf::from(custom_dir)
    } else {
        ProjectDirs::from("dev", "reel", "reel")
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?
            .data_dir()
            .to_path_buf()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path)?;
    }
    Ok(path)
    // macOS → ~/Library/Application Support/dev.reel.reel
    // Linux → ~/.local/share/reel
}

pub fn music_dir() -> io::Result<PathBuf> {
    Ok(asset_dir()?.join(layout::MUSIC_DIR))
}

pub fn output_dir() -> io::Result<PathBuf> {
    let dir = asset_dir()?.join(layout::OUTPUT_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn is_background_track(path: &Path) -> bool {
    let stem_matches = path
        .file_stem()
        .is_some_and(|s| s.to_string_lossy() == layout::BACKGROUND_STEM);
    let ext_matches = path.extension().is_some_and(|e| {
        let e = e.to_string_lossy().to_ascii_lowercase();
        AUDIO_EXTENSIONS.contains(&e.as_str())
    });
    stem_matches && ext_matches && path.is_file()
}

/// First `background.<audio ext>` in `dir`, by file name
pub fn find_background_music(dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_background_track(path))
        .collect();
    candidates.sort();
    let found = candidates.into_iter().next();
    if let Some(path) = &found {
        tracing::debug!("Using background music {}", path.display());
    }
    found
}
