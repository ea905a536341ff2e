//! ZIP 打包与解包
//!
//! - 目录下载：把目录树打包成 ZIP，条目名相对于源目录
//! - 文件夹上传：把客户端打包的 ZIP 解压到目标目录
//!
//! 解包时逐条校验条目路径，拒绝任何会逃出目标目录的条目（zip-slip）。

use log::debug;
use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// 条目路径是绝对路径或包含 `..` 逃逸
    #[error("unsafe archive entry: {0}")]
    UnsafeEntry(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// 打包结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackSummary {
    pub files: usize,
    pub bytes: u64,
}

/// 解包结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackSummary {
    pub files: usize,
    pub bytes: u64,
}

/// 将 `source` 目录树写入 ZIP
///
/// 空目录以目录条目保留；不含任何文件的目录产生一个空压缩包。
pub fn pack_dir<W: Write + Seek>(source: &Path, writer: W) -> Result<PackSummary, ArchiveError> {
    pack_filtered(source, writer, None)
}

/// 打包到文件。若 `dest` 位于 `source` 内部，打包时跳过它自身。
pub fn pack_to_file(source: &Path, dest: &Path) -> Result<PackSummary, ArchiveError> {
    let file = File::options().write(true).truncate(true).open(dest)?;
    let skip = dest.canonicalize().ok();
    pack_filtered(source, file, skip.as_deref())
}

fn pack_filtered<W: Write + Seek>(
    source: &Path,
    writer: W,
    skip: Option<&Path>,
) -> Result<PackSummary, ArchiveError> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut summary = PackSummary::default();

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();

        if let Some(skip) = skip
            && path.canonicalize().is_ok_and(|p| p == skip)
        {
            continue;
        }

        // 符号链接可能指向沙箱外部，不跟随
        if entry.path_is_symlink() {
            continue;
        }

        let Some(name) = entry_name(source, path) else {
            continue;
        };

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
            continue;
        }
        // FIFO、套接字、设备文件：打开会阻塞或没有意义
        if !entry.file_type().is_file() {
            debug!("Skipping special file {}", path.display());
            continue;
        }

        let size = entry.metadata()?.len();
        zip.start_file(name, options.large_file(size >= u64::from(u32::MAX)))?;
        let mut f = File::open(path)?;
        summary.bytes += io::copy(&mut f, &mut zip)?;
        summary.files += 1;
    }

    zip.finish()?;
    debug!(
        "Packed {} ({} files, {} bytes)",
        source.display(),
        summary.files,
        summary.bytes
    );
    Ok(summary)
}

/// ZIP 条目名统一使用 `/` 分隔
fn entry_name(source: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(source).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// 将 ZIP 解压到 `dest`，按需创建中间目录
pub fn unpack<R: Read + Seek>(reader: R, dest: &Path) -> Result<UnpackSummary, ArchiveError> {
    let mut archive = ZipArchive::new(reader)?;
    fs::create_dir_all(dest)?;

    // 先整体校验，任何一个不安全条目都不写入
    let mut targets = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        let target = safe_target(dest, file.name())?;
        targets.push((target, file.is_dir()));
    }

    let mut summary = UnpackSummary::default();
    for (i, (target, is_dir)) in targets.into_iter().enumerate() {
        if is_dir {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = archive.by_index(i)?;
        let mut out = File::create(&target)?;
        summary.bytes += io::copy(&mut file, &mut out)?;
        summary.files += 1;
    }

    debug!(
        "Unpacked {} files ({} bytes) into {}",
        summary.files,
        summary.bytes,
        dest.display()
    );
    Ok(summary)
}

/// 解包一个 ZIP 文件
pub fn unpack_file(archive: &Path, dest: &Path) -> Result<UnpackSummary, ArchiveError> {
    let file = File::open(archive)?;
    unpack(io::BufReader::new(file), dest)
}

/// 校验条目名，返回其在 `dest` 下的目标路径
fn safe_target(dest: &Path, name: &str) -> Result<PathBuf, ArchiveError> {
    // Windows 客户端打包时可能使用反斜杠
    let normalized = name.replace('\\', "/");
    let mut relative = PathBuf::new();

    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(ArchiveError::UnsafeEntry(name.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::UnsafeEntry(name.to_string()));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(ArchiveError::UnsafeEntry(name.to_string()));
    }
    Ok(dest.join(relative))
}
