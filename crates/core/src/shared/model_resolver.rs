use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use super::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("no user cache directory on this platform")]
    NoCacheDir,
    #[error("cannot prepare model cache {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("fetching {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("storing model at {path} failed: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("model {name} is not cached, not in the models directory, and has no download URL")]
    NotFound { name: String },
}

/// Called as bytes arrive: `(received, expected)`, where `expected` is 0
/// when the server sends no length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Finds `name` in the user cache, then in `models_dir`, and finally
/// downloads it from `url` into the cache.
pub fn resolve(
    name: &str,
    url: Option<&str>,
    models_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache = model_cache_dir()?;
    let search = [Some(cache.as_path()), models_dir];
    if let Some(found) = find_local(name, &search) {
        return Ok(found);
    }
    let url = url.ok_or_else(|| ModelResolveError::NotFound {
        name: name.to_string(),
    })?;
    fetch_into(&cache, name, url, progress)
}

/// First directory in `dirs` that holds a file called `name`.
fn find_local(name: &str, dirs: &[Option<&Path>]) -> Option<PathBuf> {
    dirs.iter()
        .flatten()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// `<cache>/BlinkGate/models`. macOS keeps it under Application Support.
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    let base = if cfg!(target_os = "macos") {
        dirs::data_dir()
    } else {
        dirs::cache_dir()
    };
    base.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn fetch_into(
    cache: &Path,
    name: &str,
    url: &str,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    fs::create_dir_all(cache).map_err(|source| ModelResolveError::CacheDir {
        path: cache.to_path_buf(),
        source,
    })?;
    let dest = cache.join(name);
    log::info!("Fetching {name} from {url}");

    let fail = |source| ModelResolveError::Download {
        url: url.to_string(),
        source,
    };
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(fail)?;
    let expected = response.content_length().unwrap_or(0);

    store(response, &dest, expected, progress)?;
    Ok(dest)
}

/// Streams `body` into a scratch file beside `dest` and renames it into
/// place once complete. A failed transfer leaves nothing at `dest`.
fn store(
    mut body: impl Read,
    dest: &Path,
    expected: u64,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let dir = dest.parent().unwrap_or(Path::new("."));
    let store_err = |source| ModelResolveError::Store {
        path: dest.to_path_buf(),
        source,
    };
    let mut scratch = NamedTempFile::new_in(dir).map_err(store_err)?;

    let mut buf = vec![0u8; 256 * 1024];
    let mut received = 0u64;
    loop {
        let n = body.read(&mut buf).map_err(store_err)?;
        if n == 0 {
            break;
        }
        scratch.write_all(&buf[..n]).map_err(store_err)?;
        received += n as u64;
        if let Some(report) = &progress {
            report(received, expected);
        }
    }
    scratch.flush().map_err(store_err)?;
    scratch.persist(dest).map_err(|e| store_err(e.error))?;
    Ok(())
}
