use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;

use crate::sink::{ensure_parent_dir, PersistedRow, RecordSink, SinkKind};

/// タブ区切りのテキストファイルに追記する保存先。
pub struct TextSink {
    path: PathBuf,
}

impl TextSink {
    /// 新しい`TextSink`を返す。
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSink for TextSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Text
    }

    fn append_batch(&self, rows: &[PersistedRow]) -> Result<usize> {
        ensure_parent_dir(&self.path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Не удалось открыть файл: {}", self.path.display()))?;
        for row in rows {
            writeln!(file, "{}", row.to_tsv())
                .with_context(|| format!("Не удалось сохранить в TXT: {}", self.path.display()))?;
        }
        file.flush()
            .with_context(|| format!("Не удалось сохранить в TXT: {}", self.path.display()))?;

        Ok(rows.len())
    }
}

/// テキストファイルの末尾`count`行を返す。
///
/// ファイルが無い場合や読み込めない場合は空を返す。
pub fn read_last_lines(path: &Path, count: usize) -> Vec<String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!("Failed to read {}: {}", path.display(), err);
            return Vec::new();
        }
    };

    let lines: Vec<&str> = raw.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].iter().map(|line| line.to_string()).collect()
}
