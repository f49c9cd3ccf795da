use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, NaiveDate};
use log::debug;
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::sink::{ensure_parent_dir, DifficultyValue, PersistedRow, RecordSink, SinkKind};

/// ヘッダー行。
pub const HEADERS: [&str; 7] = [
    "Дата",
    "Время",
    "День недели",
    "Часть дня",
    "Вид задачи",
    "Задача",
    "Сложность",
];

const MAX_COLUMN_WIDTH: usize = 50;

/// セルの値。
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    /// 日付書式の数値。スプレッドシートのシリアル値を保持する。
    Date(f64),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// スプレッドシートのシリアル値を日付に変換する。
pub fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// ブックを読み込む。
pub fn load_workbook(path: &Path) -> Result<Spreadsheet> {
    umya_spreadsheet::reader::xlsx::read(path)
        .map_err(|err| anyhow!("Не удалось открыть файл {}: {}", path.display(), err))
}

/// セルの値を読む。`col`と`row`は1始まり。
pub fn cell_value(sheet: &Worksheet, col: u32, row: u32) -> CellValue {
    let Some(cell) = sheet.get_cell((col, row)) else {
        return CellValue::Empty;
    };

    if let Some(number) = cell.get_value_number() {
        let is_date = cell
            .get_style()
            .get_number_format()
            .map(|format| is_date_format(format.get_format_code()))
            .unwrap_or(false);
        return if is_date {
            CellValue::Date(number)
        } else {
            CellValue::Number(number)
        };
    }

    let value = cell.get_value();
    if value.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(value.into_owned())
    }
}

// 引用符や角括弧の部分を除いて、日付の書式記号を含むかどうか。
fn is_date_format(code: &str) -> bool {
    let mut quoted = false;
    let mut bracket = false;
    for c in code.chars() {
        match c {
            '"' => quoted = !quoted,
            '[' if !quoted => bracket = true,
            ']' if !quoted => bracket = false,
            'd' | 'D' | 'y' | 'Y' if !quoted && !bracket => return true,
            _ => {}
        }
    }
    false
}

/// スプレッドシートに行を追記する保存先。
pub struct SpreadsheetSink {
    path: PathBuf,
}

impl SpreadsheetSink {
    /// 新しい`SpreadsheetSink`を返す。
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    // 隣の一時ファイルに書き出してから置き換える。
    fn replace_with(&self, book: &Spreadsheet) -> Result<()> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = self.path.with_file_name(format!("{}.tmp.xlsx", file_name));

        if let Err(err) = umya_spreadsheet::writer::xlsx::write(book, &tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            bail!("Не удалось сохранить в Excel {}: {}", self.path.display(), err);
        }
        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err)
                .with_context(|| format!("Не удалось сохранить в Excel: {}", self.path.display()));
        }

        Ok(())
    }

    fn open_or_create(&self) -> Result<Spreadsheet> {
        if self.path.exists() {
            load_workbook(&self.path)
        } else {
            debug!("Creating new workbook: {}", self.path.display());
            Ok(umya_spreadsheet::new_file())
        }
    }
}

impl RecordSink for SpreadsheetSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Spreadsheet
    }

    fn append_batch(&self, rows: &[PersistedRow]) -> Result<usize> {
        ensure_parent_dir(&self.path)?;

        let mut book = self.open_or_create()?;
        let sheet = book.get_active_sheet_mut();

        if is_sheet_empty(sheet) {
            debug!("Writing header row to {}", self.path.display());
            write_row(sheet, 1, HEADERS.iter().map(|header| header.to_string()), None);
        }
        for row in rows {
            let index = sheet.get_highest_row() + 1;
            let texts = [
                &row.date,
                &row.time,
                &row.weekday,
                &row.part_of_day,
                &row.task_type,
                &row.description,
            ];
            write_row(
                sheet,
                index,
                texts.into_iter().cloned(),
                Some(row.difficulty_value()),
            );
        }
        fit_column_widths(sheet);

        self.replace_with(&book)?;

        Ok(rows.len())
    }
}

// 1つでも値のあるセルがあれば空ではない。
fn is_sheet_empty(sheet: &Worksheet) -> bool {
    let highest_column = sheet.get_highest_column();
    (1..=sheet.get_highest_row())
        .all(|row| (1..=highest_column).all(|col| cell_value(sheet, col, row).is_empty()))
}

fn write_row(
    sheet: &mut Worksheet,
    row: u32,
    texts: impl Iterator<Item = String>,
    difficulty: Option<DifficultyValue>,
) {
    let mut col = 1;
    for text in texts {
        sheet.get_cell_mut((col, row)).set_value_string(text);
        col += 1;
    }
    match difficulty {
        Some(DifficultyValue::Number(value)) => {
            sheet.get_cell_mut((col, row)).set_value_number(value as f64);
        }
        Some(DifficultyValue::Text(value)) => {
            sheet.get_cell_mut((col, row)).set_value_string(value);
        }
        None => {}
    }
}

fn fit_column_widths(sheet: &mut Worksheet) {
    let highest_row = sheet.get_highest_row();
    for col in 1..=HEADERS.len() as u32 {
        let widest = (1..=highest_row)
            .filter_map(|row| sheet.get_cell((col, row)))
            .map(|cell| cell.get_value().chars().count())
            .max()
            .unwrap_or(0);
        let width = (widest + 2).min(MAX_COLUMN_WIDTH);
        sheet
            .get_column_dimension_by_number_mut(&col)
            .set_width(width as f64);
    }
}
