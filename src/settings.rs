use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RECENT_COUNT: u32 = 5;
pub const MAX_RECENT_COUNT: u32 = 50;
pub const DEFAULT_STATS_DAYS: u32 = 5;
pub const MAX_STATS_DAYS: u32 = 30;

const APP_DIR: &str = "task-journal";
const SETTINGS_FILE: &str = "settings.toml";

/// 難度の入力方法。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyStyle {
    Dropdown,
    #[default]
    Buttons,
}

impl FromStr for DifficultyStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "dropdown" => Ok(DifficultyStyle::Dropdown),
            "buttons" => Ok(DifficultyStyle::Buttons),
            other => bail!("Unknown difficulty style: {} (expected dropdown or buttons)", other),
        }
    }
}

impl fmt::Display for DifficultyStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultyStyle::Dropdown => f.write_str("dropdown"),
            DifficultyStyle::Buttons => f.write_str("buttons"),
        }
    }
}

/// 保存前の検証エラー。
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    NoOutputEnabled,
    MissingTextPath,
    MissingSpreadsheetPath,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoOutputEnabled => {
                write!(f, "В настройках не выбран ни один формат сохранения.")
            }
            ValidationError::MissingTextPath => write!(f, "Не указан путь для TXT-файла."),
            ValidationError::MissingSpreadsheetPath => {
                write!(f, "Не указан путь для Excel-файла.")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// アプリケーションの設定。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub save_txt: bool,
    pub save_excel: bool,
    pub txt_path: String,
    pub excel_path: String,
    recent_count: u32,
    stats_days: u32,
    #[serde(deserialize_with = "lenient_style")]
    pub difficulty_style: DifficultyStyle,
}

impl Default for Settings {
    fn default() -> Self {
        let dir = default_data_dir();
        Self {
            save_txt: true,
            save_excel: true,
            txt_path: dir.join("journal.txt").to_string_lossy().into_owned(),
            excel_path: dir.join("journal.xlsx").to_string_lossy().into_owned(),
            recent_count: DEFAULT_RECENT_COUNT,
            stats_days: DEFAULT_STATS_DAYS,
            difficulty_style: DifficultyStyle::default(),
        }
    }
}

impl Settings {
    /// 設定ファイルを読み込む。
    ///
    /// ファイルが存在しない場合や読み込めない場合は初期値を返す。
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("Settings file not found, using defaults: {}", path.display());
            return Self::default();
        }

        match Self::read(path) {
            Ok(settings) => {
                info!("Settings loaded from {}", path.display());
                settings
            }
            Err(err) => {
                warn!("Failed to load settings, using defaults: {:#}", err);
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str::<Settings>(raw)?)
    }

    /// 設定ファイルに書き込む。
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }
        let raw = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, raw)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;
        info!("Settings saved to {}", path.display());

        Ok(())
    }

    /// 最近のタスクとして表示する件数(1..=50)。
    pub fn recent_count(&self) -> u32 {
        self.recent_count.clamp(1, MAX_RECENT_COUNT)
    }

    pub fn set_recent_count(&mut self, count: u32) {
        self.recent_count = count.clamp(1, MAX_RECENT_COUNT);
    }

    /// 統計に表示する日数(1..=30)。
    pub fn stats_days(&self) -> u32 {
        self.stats_days.clamp(1, MAX_STATS_DAYS)
    }

    pub fn set_stats_days(&mut self, days: u32) {
        self.stats_days = days.clamp(1, MAX_STATS_DAYS);
    }

    /// 保存先の設定を検証する。I/Oは行わない。
    pub fn validate_outputs(&self) -> Result<(), ValidationError> {
        if !self.save_txt && !self.save_excel {
            return Err(ValidationError::NoOutputEnabled);
        }
        if self.save_txt && self.txt_path.trim().is_empty() {
            return Err(ValidationError::MissingTextPath);
        }
        if self.save_excel && self.excel_path.trim().is_empty() {
            return Err(ValidationError::MissingSpreadsheetPath);
        }

        Ok(())
    }

    /// キーを指定して値を更新する。
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "save_txt" => self.save_txt = parse_bool(value)?,
            "save_excel" => self.save_excel = parse_bool(value)?,
            "txt_path" => self.txt_path = value.trim().to_string(),
            "excel_path" => self.excel_path = value.trim().to_string(),
            "recent_count" => self.set_recent_count(parse_count(key, value)?),
            "stats_days" => self.set_stats_days(parse_count(key, value)?),
            "difficulty_style" => self.difficulty_style = value.parse()?,
            _ => bail!("Unknown settings key: {}", key),
        }

        Ok(())
    }
}

/// 設定ファイルの既定のパス。
///
/// - Linux:   `$XDG_CONFIG_HOME/task-journal/settings.toml`
/// - macOS:   `~/Library/Application Support/task-journal/settings.toml`
/// - Windows: `%APPDATA%\task-journal\settings.toml`
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(SETTINGS_FILE)
}

fn default_data_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => bail!("Expected a boolean, got: {}", other),
    }
}

fn parse_count(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .with_context(|| format!("Expected a positive integer for {}, got: {}", key, value))
}

// 不正な値は既定値に置き換える。
fn lenient_style<'de, D>(deserializer: D) -> Result<DifficultyStyle, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_default())
}
