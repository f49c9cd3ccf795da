use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;

/// ファイルを外部のアプリケーションで開く。
#[cfg_attr(test, mockall::automock)]
pub trait ExternalViewer {
    fn open(&self, path: &Path) -> Result<()>;
}

/// OSの既定のアプリケーションで開く。
pub struct SystemViewer;

impl ExternalViewer for SystemViewer {
    fn open(&self, path: &Path) -> Result<()> {
        open::that(path).with_context(|| format!("Не удалось открыть файл: {}", path.display()))?;
        info!("Opened {}", path.display());

        Ok(())
    }
}

/// 設定されたパスを検証してから開く。
///
/// # Arguments
///
/// * `viewer` - ファイルを開く実装
/// * `path` - 設定されたパス
pub fn open_journal_file<V: ExternalViewer + ?Sized>(viewer: &V, path: &str) -> Result<()> {
    let path = path.trim();
    if path.is_empty() {
        bail!("Не указан путь к файлу.");
    }
    let path = Path::new(path);
    if !path.exists() {
        bail!("Файл не существует: {}", path.display());
    }

    viewer.open(path)
}
