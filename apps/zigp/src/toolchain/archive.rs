//! Unpacking toolchain archives.
//!
//! Supports `.tar.xz` (xz2 + tar) and `.zip`. Leading path components are
//! stripped from every entry, and any entry that would land outside the
//! destination is rejected: absolute paths, `..` components, and links
//! whose targets escape the destination all fail extraction. Containment
//! is checked against the real on-disk location of each entry's parent, so
//! links written by earlier entries cannot be used to step outside.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use tar::{Archive, EntryType};
use xz2::read::XzDecoder;

use super::artifact::ArchiveFormat;
use crate::errors::{Result, ZigpError};

/// Extracts `archive` into `dest`, dropping `strip_components` leading
/// components from every entry path.
///
/// Creates `dest` if it does not exist. Entries that have no components
/// left after stripping (the top-level directory itself) are skipped.
///
/// # Errors
///
/// Returns `ExtractionError` for corrupt archives and unsafe entry paths,
/// and `FilesystemError` when writing to `dest` fails.
pub fn extract(
    archive: &Path,
    format: ArchiveFormat,
    dest: &Path,
    strip_components: usize,
) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| ZigpError::fs("failed to create", dest, e))?;
    let file = fs::File::open(archive).map_err(|e| ZigpError::fs("failed to open", archive, e))?;

    tracing::debug!(
        archive = %archive.display(),
        dest = %dest.display(),
        %format,
        strip_components,
        "extracting"
    );

    match format {
        ArchiveFormat::TarXz => extract_tar(XzDecoder::new(file), archive, dest, strip_components),
        ArchiveFormat::Zip => extract_zip(file, archive, dest, strip_components),
    }
}

fn extract_tar<R: Read>(
    reader: R,
    archive_path: &Path,
    dest: &Path,
    strip_components: usize,
) -> Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    let root = fs::canonicalize(dest).map_err(|e| ZigpError::fs("failed to resolve", dest, e))?;

    let entries = archive
        .entries()
        .map_err(|e| ZigpError::extraction(archive_path, format!("unreadable archive: {e}")))?;

    for entry in entries {
        let mut entry = entry
            .map_err(|e| ZigpError::extraction(archive_path, format!("corrupt entry: {e}")))?;
        let entry_path = entry
            .path()
            .map_err(|e| ZigpError::extraction(archive_path, format!("invalid entry path: {e}")))?
            .into_owned();

        let Some(target) = stripped_target(archive_path, dest, &entry_path, strip_components)?
        else {
            continue;
        };
        let base = contained_parent(archive_path, &root, &target)?;
        create_parent(&target)?;

        let entry_type = entry.header().entry_type();
        if entry_type == EntryType::Link {
            let link_name = entry
                .link_name()
                .ok()
                .flatten()
                .ok_or_else(|| {
                    ZigpError::extraction(
                        archive_path,
                        format!("hard link {} has no target", entry_path.display()),
                    )
                })?
                .into_owned();
            let Some(source) = stripped_target(archive_path, dest, &link_name, strip_components)?
            else {
                return Err(ZigpError::extraction(
                    archive_path,
                    format!("hard link {} points outside the archive", entry_path.display()),
                ));
            };
            contained_parent(archive_path, &root, &source)?;
            fs::hard_link(&source, &target)
                .map_err(|e| ZigpError::fs("failed to link", &target, e))?;
            continue;
        }

        if entry_type == EntryType::Symlink {
            let link_name = entry.link_name().ok().flatten().ok_or_else(|| {
                ZigpError::extraction(
                    archive_path,
                    format!("symlink {} has no target", entry_path.display()),
                )
            })?;
            if symlink_escapes(&root, &base, &link_name) {
                return Err(ZigpError::extraction(
                    archive_path,
                    format!(
                        "symlink {} -> {} escapes the destination",
                        entry_path.display(),
                        link_name.display()
                    ),
                ));
            }
        }

        entry
            .unpack(&target)
            .map_err(|e| read_or_write_error(archive_path, "failed to unpack", &target, e))?;
    }

    Ok(())
}

fn extract_zip(
    file: fs::File,
    archive_path: &Path,
    dest: &Path,
    strip_components: usize,
) -> Result<()> {
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ZigpError::extraction(archive_path, format!("invalid ZIP archive: {e}")))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ZigpError::extraction(archive_path, format!("corrupt entry {i}: {e}")))?;

        let entry_path = entry.enclosed_name().ok_or_else(|| {
            ZigpError::extraction(
                archive_path,
                format!("refusing unsafe entry path {}", entry.name()),
            )
        })?;

        let Some(target) = stripped_target(archive_path, dest, &entry_path, strip_components)?
        else {
            continue;
        };

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| ZigpError::fs("failed to create", &target, e))?;
            continue;
        }

        create_parent(&target)?;
        let mut outfile =
            fs::File::create(&target).map_err(|e| ZigpError::fs("failed to create", &target, e))?;
        std::io::copy(&mut entry, &mut outfile)
            .map_err(|e| read_or_write_error(archive_path, "failed to extract", &target, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))
                .map_err(|e| ZigpError::fs("failed to set permissions on", &target, e))?;
        }
    }

    Ok(())
}

/// Maps an archive entry path onto `dest`.
///
/// Returns `None` when nothing is left after stripping.
fn stripped_target(
    archive_path: &Path,
    dest: &Path,
    entry_path: &Path,
    strip_components: usize,
) -> Result<Option<PathBuf>> {
    let unsafe_path = entry_path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if unsafe_path {
        return Err(ZigpError::extraction(
            archive_path,
            format!(
                "refusing to extract path with parent directory or absolute reference: {}",
                entry_path.display()
            ),
        ));
    }

    let mut target = dest.to_path_buf();
    let mut pushed = false;
    for component in entry_path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .skip(strip_components)
    {
        target.push(component.as_os_str());
        pushed = true;
    }

    Ok(pushed.then_some(target))
}

/// Resolves the directory `target` will be written into and requires it to
/// lie inside `root`, the canonical destination.
///
/// The nearest existing ancestor is canonicalized, which follows any links
/// already extracted. Returns the resolved directory.
fn contained_parent(archive_path: &Path, root: &Path, target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(target);
    let mut existing = parent;
    let mut missing = Vec::new();
    while !existing.exists() {
        let (Some(up), Some(name)) = (existing.parent(), existing.file_name()) else {
            break;
        };
        missing.push(name.to_os_string());
        existing = up;
    }

    let mut resolved = fs::canonicalize(existing)
        .map_err(|e| ZigpError::fs("failed to resolve", existing, e))?;
    if !resolved.starts_with(root) {
        return Err(ZigpError::extraction(
            archive_path,
            format!("refusing to write {} outside the destination", target.display()),
        ));
    }
    resolved.extend(missing.iter().rev());
    Ok(resolved)
}

/// Whether a symlink in directory `base` pointing to `link_target`
/// resolves outside `root`. Both paths must already be canonical.
fn symlink_escapes(root: &Path, base: &Path, link_target: &Path) -> bool {
    if link_target.is_absolute() {
        return true;
    }
    let Ok(relative) = base.strip_prefix(root) else {
        return true;
    };

    let mut depth: usize = relative.components().count();
    for component in link_target.components() {
        match component {
            Component::ParentDir => {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}

/// Classifies a failure while copying entry data. Decoder and truncation
/// errors come from reading the archive; anything else is a write failure.
fn read_or_write_error(
    archive_path: &Path,
    action: &'static str,
    target: &Path,
    err: std::io::Error,
) -> ZigpError {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::InvalidData
        | ErrorKind::InvalidInput
        | ErrorKind::Other => ZigpError::extraction(
            archive_path,
            format!("corrupt data for {}: {err}", target.display()),
        ),
        _ => ZigpError::fs(action, target, err),
    }
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(|e| ZigpError::fs("failed to create", parent, e))
        }
        None => Ok(()),
    }
}

/// Sets `0o755` on `path` (Unix only).
///
/// # Errors
///
/// Returns `FilesystemError` if the permissions cannot be read or set.
#[cfg(unix)]
pub fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .map_err(|e| ZigpError::fs("failed to read metadata of", path, e))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
        .map_err(|e| ZigpError::fs("failed to set permissions on", path, e))
}

/// No-op on Windows.
///
/// # Errors
///
/// Never fails.
#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
