//! Shared filesystem helpers built on `cap-std` and `camino`.
//!
//! Every helper resolves an ambient directory for the parent of the target
//! and performs the operation relative to it.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io::{self, Write};
use std::path::Component;

/// Resolve the ambient parent directory of `path` and return it with the file name.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("target should include a file name"))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Ensure the parent directory for `path` exists.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }
    let (base_dir, relative) = base_dir_and_relative(parent)?;
    if relative.as_os_str().is_empty() {
        return Ok(());
    }
    base_dir.create_dir_all(&relative)
}

/// Whether `path` exists and is a regular file.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.metadata(name.as_str()).map(|meta| meta.is_file())
}

/// Whether `path` exists and is a directory.
pub fn dir_is_dir(path: &Utf8Path) -> io::Result<bool> {
    fs_utf8::Dir::open_ambient_dir(path, ambient_authority())
        .and_then(|dir| dir.dir_metadata())
        .map(|meta| meta.is_dir())
}

/// Whether anything exists at `path`. A missing parent counts as absent.
pub fn path_exists(path: &Utf8Path) -> io::Result<bool> {
    match open_dir_and_file(path) {
        Ok((dir, name)) => Ok(dir.exists(name.as_str())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Read a whole UTF-8 text file.
pub fn read_to_string(path: &Utf8Path) -> io::Result<String> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.read_to_string(name.as_str())
}

/// Create or truncate a file, returning a standard handle for writers that
/// expect `std::fs::File`.
pub fn create_file(path: &Utf8Path) -> io::Result<std::fs::File> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.create(name.as_str()).map(fs_utf8::File::into_std)
}

/// Write `contents` next to `path` under a temporary name, then rename it
/// into place so readers never observe a partial file.
pub fn write_atomic(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let (dir, name) = open_dir_and_file(path)?;
    let staging = format!(".{name}.partial");
    {
        let mut file = dir.create(staging.as_str())?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    dir.rename(staging.as_str(), &dir, name.as_str())
}

/// Remove a file if it exists.
pub fn remove_file_if_exists(path: &Utf8Path) -> io::Result<()> {
    let (dir, name) = open_dir_and_file(path)?;
    match dir.remove_file(name.as_str()) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Regular files in `dir` with the given extension, sorted by file name.
pub fn list_files_with_extension(dir: &Utf8Path, extension: &str) -> io::Result<Vec<Utf8PathBuf>> {
    let handle = fs_utf8::Dir::open_ambient_dir(dir, ambient_authority())?;
    let mut names = Vec::new();
    for entry in handle.entries()? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name()?;
        let matches = Utf8Path::new(&name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches {
            names.push(name);
        }
    }
    names.sort();
    Ok(names.into_iter().map(|name| dir.join(name)).collect())
}

/// Split an absolute or relative parent path into an ambient base directory and a relative suffix.
pub fn base_dir_and_relative(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_parent = parent.as_std_path();

    let (base, relative) = match std_parent.components().next() {
        // Windows absolute path with a drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_parent.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from parent path"))?
                .to_path_buf();
            (base, relative)
        }
        // Unix-style absolute path.
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), std_parent.to_path_buf()),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative = Utf8PathBuf::from_path_buf(relative)
        .map_err(|_| io::Error::other("non-UTF-8 parent path"))?;
    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn scratch() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 tempdir");
        (dir, root)
    }

    #[rstest]
    fn atomic_writes_replace_existing_files(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        let target = root.join("result.json");
        write_atomic(&target, b"first").expect("first write");
        write_atomic(&target, b"second").expect("second write");
        assert_eq!(read_to_string(&target).expect("read back"), "second");
        assert!(!path_exists(&root.join(".result.json.partial")).expect("inspect"));
    }

    #[rstest]
    fn ensure_parent_dir_creates_nested_directories(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        let target = root.join("a/b/c.poly");
        ensure_parent_dir(&target).expect("create parents");
        assert!(dir_is_dir(&root.join("a/b")).expect("inspect"));
    }

    #[rstest]
    fn file_checks_distinguish_files_and_directories(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        let file = root.join("input.osm.pbf");
        create_file(&file).expect("create");
        assert!(file_is_file(&file).expect("inspect file"));
        assert!(!file_is_file(&root).expect("inspect dir"));
        assert!(dir_is_dir(&root).expect("inspect dir"));
    }

    #[rstest]
    fn missing_parents_count_as_absent(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        assert!(!path_exists(&root.join("nowhere/out.gpkg")).expect("inspect"));
    }

    #[rstest]
    fn listing_filters_and_sorts_by_name(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        for name in ["b.gpkg", "a.GPKG", "c.shp"] {
            create_file(&root.join(name)).expect("create");
        }
        let listed = list_files_with_extension(&root, "gpkg").expect("list");
        let names: Vec<&str> = listed.iter().filter_map(|p| p.file_name()).collect();
        assert_eq!(names, vec!["a.GPKG", "b.gpkg"]);
    }

    #[rstest]
    fn removing_missing_files_is_not_an_error(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        remove_file_if_exists(&root.join("gone.json")).expect("remove");
    }
}
