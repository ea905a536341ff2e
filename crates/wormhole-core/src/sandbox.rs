//! 路径沙箱
//!
//! 把客户端传来的相对路径映射到服务根目录之下。所有读、写、删除操作
//! 都必须先经过 [`resolve`]，解析结果保证是根目录本身或其子孙。

use log::warn;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    /// 解析结果落在根目录之外
    #[error("path escapes the server root: {0}")]
    Escape(String),

    /// 根目录本身不存在或无法规范化
    #[error("server root is unavailable: {0}")]
    RootUnavailable(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// 访问权限类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// 将 `requested` 解析为根目录下的规范绝对路径
///
/// 目标不必存在：会规范化最深的已存在祖先，再拼回剩余部分，
/// 这样指向根目录外的符号链接同样会被拒绝。
pub fn resolve(root: &Path, requested: &str) -> Result<PathBuf, SandboxError> {
    resolve_path(root, Path::new(requested))
}

/// 解析目录项本身而不跟随最后一段的符号链接
///
/// 父目录按 [`resolve`] 的规则规范化并校验，最后一段原样保留，
/// 因此对符号链接的删除作用于链接而不是它指向的内容。
/// 根目录本身没有父目录可校验，视为越界。
pub fn resolve_entry(root: &Path, requested: &str) -> Result<PathBuf, SandboxError> {
    let joined = normalize(&root.join(requested));
    let (Some(parent), Some(name)) = (joined.parent(), joined.file_name()) else {
        return Err(SandboxError::Escape(requested.to_string()));
    };
    if joined == normalize(root) {
        return Err(SandboxError::Escape(requested.to_string()));
    }

    let parent = resolve_path(root, parent)?;
    Ok(parent.join(name))
}

/// 请求路径的最后一段名称（词法意义上，不跟随符号链接）
pub fn entry_name(root: &Path, requested: &str) -> Option<String> {
    normalize(&root.join(requested))
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

fn resolve_path(root: &Path, requested: &Path) -> Result<PathBuf, SandboxError> {
    let canonical_root = root
        .canonicalize()
        .map_err(|_| SandboxError::RootUnavailable(root.to_path_buf()))?;

    let joined = normalize(&root.join(requested));
    let resolved = canonicalize_existing_prefix(&joined)?;

    if resolved.starts_with(&canonical_root) {
        Ok(resolved)
    } else {
        warn!(
            "Path traversal attempt: {:?} (resolved to {})",
            requested,
            resolved.display()
        );
        Err(SandboxError::Escape(requested.to_string_lossy().into_owned()))
    }
}

/// 纯词法的路径规范化，不访问文件系统
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // 已经到达根部，`..` 无处可去
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn canonicalize_existing_prefix(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path;
    let mut rest = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(canonical) => {
                let mut full = canonical;
                for name in rest.iter().rev() {
                    full.push(name);
                }
                return Ok(full);
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                // 悬空的符号链接：写入时会穿透到链接目标，无法确认其位置
                if existing.symlink_metadata().is_ok() {
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        "dangling symlink",
                    ));
                }
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(e);
                };
                rest.push(name.to_os_string());
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }
}

/// 以 `/` 分隔的、相对于根目录的路径，供列表和下载链接使用
pub fn relative_to_root(root: &Path, path: &Path) -> Option<String> {
    let canonical_root = root.canonicalize().ok()?;
    let relative = path
        .strip_prefix(&canonical_root)
        .or_else(|_| path.strip_prefix(root))
        .ok()?;

    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// 检查当前进程对 `path` 是否有读/写权限
#[cfg(unix)]
pub fn check_access(path: &Path, access: Access) -> bool {
    use nix::unistd::AccessFlags;

    let mode = match access {
        Access::Read => AccessFlags::R_OK,
        Access::Write => AccessFlags::W_OK,
    };
    nix::unistd::access(path, mode).is_ok()
}

#[cfg(not(unix))]
pub fn check_access(path: &Path, access: Access) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => access == Access::Read || !meta.permissions().readonly(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("data");
        fs::create_dir_all(root.join("subdir")).unwrap();
        fs::write(root.join("subdir/file.txt"), b"hi").unwrap();
        (tmp, root)
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/a/../../..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("a//b/")), PathBuf::from("a/b"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_resolve_allows_descendants() {
        let (_tmp, root) = setup();
        let resolved = resolve(&root, "subdir/file.txt").unwrap();
        assert_eq!(
            resolved,
            root.canonicalize().unwrap().join("subdir/file.txt")
        );

        // 根目录本身也是合法目标
        assert_eq!(resolve(&root, "").unwrap(), root.canonicalize().unwrap());
        assert_eq!(resolve(&root, ".").unwrap(), root.canonicalize().unwrap());
    }

    #[test]
    fn test_resolve_rejects_parent_escape() {
        let (_tmp, root) = setup();
        assert!(matches!(
            resolve(&root, "../../etc/passwd"),
            Err(SandboxError::Escape(_))
        ));
        assert!(matches!(
            resolve(&root, "subdir/../../escape"),
            Err(SandboxError::Escape(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_absolute_outside() {
        let (_tmp, root) = setup();
        assert!(matches!(
            resolve(&root, "/etc/passwd"),
            Err(SandboxError::Escape(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_sibling_with_shared_prefix() {
        let (tmp, root) = setup();
        fs::create_dir_all(tmp.path().join("data_evil")).unwrap();
        assert!(matches!(
            resolve(&root, "../data_evil"),
            Err(SandboxError::Escape(_))
        ));
    }

    #[test]
    fn test_resolve_missing_target_inside_root() {
        let (_tmp, root) = setup();
        let resolved = resolve(&root, "subdir/new/deep.txt").unwrap();
        assert!(resolved.ends_with("subdir/new/deep.txt"));
        assert!(!resolved.exists());
    }

    #[test]
    fn test_resolve_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            resolve(&missing, "a.txt"),
            Err(SandboxError::RootUnavailable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_escape() {
        let (tmp, root) = setup();
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.txt"), b"s").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        assert!(matches!(
            resolve(&root, "link/secret.txt"),
            Err(SandboxError::Escape(_))
        ));
    }

    #[test]
    fn test_relative_to_root() {
        let (_tmp, root) = setup();
        let target = resolve(&root, "subdir/file.txt").unwrap();
        assert_eq!(
            relative_to_root(&root, &target).as_deref(),
            Some("subdir/file.txt")
        );
        assert_eq!(
            relative_to_root(&root, &root.canonicalize().unwrap()).as_deref(),
            Some("")
        );
    }

    #[test]
    fn test_resolve_entry_keeps_last_component() {
        let (_tmp, root) = setup();
        let entry = resolve_entry(&root, "subdir/file.txt").unwrap();
        assert_eq!(entry, root.canonicalize().unwrap().join("subdir/file.txt"));

        assert!(matches!(
            resolve_entry(&root, "."),
            Err(SandboxError::Escape(_))
        ));
        assert!(matches!(
            resolve_entry(&root, "../data_evil"),
            Err(SandboxError::Escape(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_entry_does_not_follow_final_symlink() {
        let (tmp, root) = setup();
        std::os::unix::fs::symlink(root.join("subdir"), root.join("alias")).unwrap();
        std::os::unix::fs::symlink(tmp.path(), root.join("up")).unwrap();

        let entry = resolve_entry(&root, "alias").unwrap();
        assert_eq!(entry, root.canonicalize().unwrap().join("alias"));
        assert!(entry.symlink_metadata().unwrap().file_type().is_symlink());

        // 经由链接的中间段仍然要落在根目录内
        assert!(matches!(
            resolve_entry(&root, "up/data_evil"),
            Err(SandboxError::Escape(_))
        ));
    }

    #[test]
    fn test_entry_name_is_lexical() {
        let (_tmp, root) = setup();
        assert_eq!(entry_name(&root, "a/b/../c.txt").as_deref(), Some("c.txt"));
    }

    #[test]
    fn test_check_access_existing_file() {
        let (_tmp, root) = setup();
        assert!(check_access(&root.join("subdir/file.txt"), Access::Read));
        assert!(!check_access(&root.join("missing.txt"), Access::Read));
    }
}
