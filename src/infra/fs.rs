//! # File System Operations Module / 文件系统操作模块
//!
//! Small helpers for the few places that touch the file system: report
//! destinations and config paths handed to worker processes.
//!
//! 少量文件系统辅助函数：报告输出路径以及传给工作进程的配置路径。

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Creates every missing parent directory of `path`.
///
/// # Arguments
/// * `path` - A file path whose directory must exist afterwards
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}

/// Gets the absolute path from a potentially relative path.
///
/// # Arguments
/// * `path` - Path to canonicalize
///
/// # Returns
/// Canonicalized absolute path, or an error if the path doesn't exist
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).with_context(|| format!("Failed to resolve path: {}", path.display()))
}
