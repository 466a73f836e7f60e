//! In-place remuxing
//!
//! Rewrites a container with every stream copied as is, which repairs many
//! index and timestamp problems without re-encoding.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::fs;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::errors::{ScanError, ScanResult};

use super::filter::filter_diagnostics;

/// Remux `path` in place using `ffmpeg`
///
/// The result is written next to the original as `<stem>_temp_.<ext>` and
/// renamed over it on success. Diagnostics from a successful run are logged
/// as warnings and returned.
///
/// # Errors
///
/// Returns `ScanError::Remux` if `path` is not a regular file or ffmpeg
/// fails; the temporary file is removed and the original left untouched.
pub async fn remux(path: &Path, ffmpeg: &Path) -> ScanResult<Vec<String>> {
    let is_file = fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false);
    if !is_file {
        error!("Can only remux files, got {}", path.display());
        return Err(ScanError::Remux {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }

    let temp_path = temp_path_for(path);
    debug!("Remuxing {} via {}", path.display(), temp_path.display());

    let result = run_ffmpeg(path, &temp_path, ffmpeg).await;
    let diagnostics = match result {
        Ok(diagnostics) => diagnostics,
        Err(e) => {
            error!("{}", e);
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
    };

    for line in &diagnostics {
        warn!("{}: {}", path.display(), line);
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(ScanError::Remux {
            path: path.to_path_buf(),
            reason: format!("cannot replace original: {}", e),
        });
    }

    info!("Remuxed {}", path.display());
    Ok(diagnostics)
}

async fn run_ffmpeg(path: &Path, temp_path: &Path, ffmpeg: &Path) -> ScanResult<Vec<String>> {
    let output = Command::new(ffmpeg)
        .arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(path)
        .args(["-c", "copy", "-map", "0"])
        .arg(temp_path)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ScanError::Spawn {
            program: ffmpeg.display().to_string(),
            source,
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let diagnostics = filter_diagnostics(&text);

    if !output.status.success() {
        let reason = if diagnostics.is_empty() {
            match output.status.code() {
                Some(code) => format!("ffmpeg exited with status {}", code),
                None => "ffmpeg terminated by signal".to_string(),
            }
        } else {
            diagnostics.join("; ")
        };
        return Err(ScanError::Remux {
            path: path.to_path_buf(),
            reason,
        });
    }

    Ok(diagnostics)
}

/// `<dir>/<stem>_temp_.<ext>` beside `path`
fn temp_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_temp_.{}", stem, ext.to_string_lossy()),
        None => format!("{}_temp_", stem),
    };
    path.with_file_name(name)
}
