use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use log::{debug, info, warn};

use crate::derivation::DATE_FORMAT;
use crate::spreadsheet::{cell_value, date_from_serial, load_workbook, CellValue};

/// 種類が空のレコードに使う種類名。
pub const UNSPECIFIED_TASK_TYPE: &str = "Не указан";

/// 集計に使う列の位置(1始まり)。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatisticsColumns {
    pub date: u32,
    pub task_type: u32,
    pub difficulty: u32,
}

impl Default for StatisticsColumns {
    fn default() -> Self {
        Self {
            date: 1,
            task_type: 5,
            difficulty: 7,
        }
    }
}

/// 1日分の集計。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DayStatistics {
    pub count: u64,
    pub total_difficulty: i64,
    pub difficulty_by_type: BTreeMap<String, i64>,
}

/// 集計結果。
///
/// `error`が`Some`の場合、`days`は途中までの結果である。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatisticsResult {
    pub days: BTreeMap<NaiveDate, DayStatistics>,
    pub error: Option<String>,
}

// 日付セルのキャッシュのキー。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum DateKey {
    Text(String),
    Serial(u64),
}

/// 1回の集計の間だけ保持する日付の解析結果のキャッシュ。
#[derive(Debug, Default)]
struct DateCache {
    parsed: HashMap<DateKey, Option<NaiveDate>>,
}

impl DateCache {
    fn parse(&mut self, value: &CellValue) -> Option<NaiveDate> {
        let key = match value {
            CellValue::Text(text) => DateKey::Text(text.clone()),
            CellValue::Date(serial) => DateKey::Serial(serial.to_bits()),
            CellValue::Empty | CellValue::Number(_) => return None,
        };
        *self.parsed.entry(key).or_insert_with(|| match value {
            CellValue::Text(text) => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok(),
            CellValue::Date(serial) => date_from_serial(*serial),
            _ => None,
        })
    }
}

/// 行を日付ごとに集計する。
#[derive(Debug, Default)]
pub struct Aggregation {
    days: BTreeMap<NaiveDate, DayStatistics>,
    cache: DateCache,
}

impl Aggregation {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1行分を集計に加える。日付が解釈できない行は無視し、`false`を返す。
    pub fn add_row(&mut self, date: &CellValue, task_type: &CellValue, difficulty: &CellValue) -> bool {
        let Some(date) = self.cache.parse(date) else {
            return false;
        };
        let task_type = match task_type {
            CellValue::Text(text) if !text.trim().is_empty() => text.clone(),
            CellValue::Number(number) | CellValue::Date(number) => number.to_string(),
            _ => UNSPECIFIED_TASK_TYPE.to_string(),
        };
        let difficulty = difficulty_of(difficulty);

        let day = self.days.entry(date).or_default();
        day.count += 1;
        day.total_difficulty += difficulty;
        *day.difficulty_by_type.entry(task_type).or_insert(0) += difficulty;
        true
    }

    pub fn finish(self, error: Option<String>) -> StatisticsResult {
        StatisticsResult {
            days: self.days,
            error,
        }
    }
}

// 整数にならない難度は0とする。
fn difficulty_of(value: &CellValue) -> i64 {
    match value {
        CellValue::Number(number) | CellValue::Date(number) if number.is_finite() => {
            number.trunc() as i64
        }
        CellValue::Text(text) => text.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    }
}

/// スプレッドシートを読み込み、日付ごとの件数と難度の合計を集計する。
///
/// エラーは返さず、結果の`error`に格納する。
///
/// # Arguments
///
/// * `path` - スプレッドシートのパス
/// * `columns` - 日付、種類、難度の列の位置
pub fn compute_statistics(path: Option<&Path>, columns: StatisticsColumns) -> StatisticsResult {
    let path = match path {
        None => return failed("Путь к Excel-файлу не задан в настройках."),
        Some(path) if path.as_os_str().is_empty() => return failed("Путь к Excel-файлу пуст."),
        Some(path) if !path.is_file() => {
            return failed(format!("Excel-файл не найден: {}", path.display()))
        }
        Some(path) => path,
    };

    let mut aggregation = Aggregation::new();
    let error = scan_workbook(path, columns, &mut aggregation)
        .err()
        .map(|err| {
            warn!("Failed to compute statistics: {:#}", err);
            format!("Ошибка при чтении Excel-файла: {:#}", err)
        });
    let result = aggregation.finish(error);
    info!("Statistics computed for {} day(s)", result.days.len());

    result
}

fn failed(message: impl Into<String>) -> StatisticsResult {
    StatisticsResult {
        days: BTreeMap::new(),
        error: Some(message.into()),
    }
}

// ブックはこの関数の終了時に必ず破棄される。
fn scan_workbook(path: &Path, columns: StatisticsColumns, aggregation: &mut Aggregation) -> Result<()> {
    let book = load_workbook(path)?;
    let sheet = book.get_active_sheet();

    let start_row = match cell_value(sheet, columns.date, 1) {
        CellValue::Text(text) if text.to_lowercase().contains("дата") => 2,
        _ => 1,
    };
    debug!("Scanning {} from row {}", path.display(), start_row);

    for row in start_row..=sheet.get_highest_row() {
        let date = cell_value(sheet, columns.date, row);
        if date.is_empty() {
            continue;
        }
        let task_type = cell_value(sheet, columns.task_type, row);
        let difficulty = cell_value(sheet, columns.difficulty, row);
        if !aggregation.add_row(&date, &task_type, &difficulty) {
            debug!("Skipping row {}: unrecognized date {:?}", row, date);
        }
    }

    Ok(())
}

/// 統計の表。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatisticsTable {
    /// 新しい日付から順に並ぶ列。
    pub dates: Vec<NaiveDate>,
    pub total_count: Vec<u64>,
    pub total_difficulty: Vec<i64>,
    /// 種類名の辞書順。
    pub by_type: Vec<(String, Vec<i64>)>,
}

impl StatisticsTable {
    /// 新しい日付から`days`日分の表を作る。
    pub fn from_result(result: &StatisticsResult, days: usize) -> Self {
        let dates: Vec<NaiveDate> = result.days.keys().rev().take(days.max(1)).cloned().collect();
        let shown: Vec<&DayStatistics> = dates.iter().filter_map(|date| result.days.get(date)).collect();

        let task_types: BTreeSet<&String> = shown
            .iter()
            .flat_map(|day| day.difficulty_by_type.keys())
            .collect();
        let by_type = task_types
            .into_iter()
            .map(|task_type| {
                let values = shown
                    .iter()
                    .map(|day| day.difficulty_by_type.get(task_type).copied().unwrap_or(0))
                    .collect();
                (task_type.clone(), values)
            })
            .collect();

        Self {
            total_count: shown.iter().map(|day| day.count).collect(),
            total_difficulty: shown.iter().map(|day| day.total_difficulty).collect(),
            dates,
            by_type,
        }
    }
}
