use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::record::{RecordCollection, RecordEntry};
use crate::settings::{Settings, ValidationError};
use crate::spreadsheet::SpreadsheetSink;
use crate::text_sink::TextSink;

/// 保存先の種類。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkKind {
    Text,
    Spreadsheet,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Text => f.write_str("TXT"),
            SinkKind::Spreadsheet => f.write_str("Excel"),
        }
    }
}

/// 難度の保存値。整数として解釈できない場合は文字列のまま保存する。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DifficultyValue {
    Number(i64),
    Text(String),
}

impl DifficultyValue {
    fn from_raw(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(value) => DifficultyValue::Number(value),
            Err(_) => DifficultyValue::Text(raw.to_string()),
        }
    }
}

/// 保存先に書き込まれる1行。
///
/// 列の順序は全ての保存先で共通。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistedRow {
    pub date: String,
    pub time: String,
    pub weekday: String,
    pub part_of_day: String,
    pub task_type: String,
    pub description: String,
    /// 入力された難度の文字列。
    pub difficulty: String,
}

impl PersistedRow {
    /// スプレッドシートに書き込む難度の値。
    pub fn difficulty_value(&self) -> DifficultyValue {
        DifficultyValue::from_raw(&self.difficulty)
    }

    /// テキストの1行に整形する。改行は含まない。
    pub fn to_tsv(&self) -> String {
        [
            self.date.as_str(),
            self.time.as_str(),
            self.weekday.as_str(),
            self.part_of_day.as_str(),
            self.task_type.as_str(),
            self.description.as_str(),
            self.difficulty.as_str(),
        ]
        .join("\t")
    }
}

/// 保存前のフィルタと正規化。
///
/// 説明が空白のみのレコードは除外し、説明の改行は空白に置き換える。
pub fn prepare_rows(entries: &[RecordEntry]) -> Vec<PersistedRow> {
    entries
        .iter()
        .filter(|entry| !entry.is_blank())
        .map(|entry| PersistedRow {
            date: entry.date().to_string(),
            time: entry.time().to_string(),
            weekday: entry.weekday().to_string(),
            part_of_day: entry.part_of_day().to_string(),
            task_type: entry.task_type.code().to_string(),
            description: entry.description.trim().replace(['\n', '\r'], " "),
            difficulty: entry.difficulty.clone(),
        })
        .collect()
}

/// 保存先のディレクトリが無ければ作成する。
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent)
                .with_context(|| format!("Не удалось создать директорию: {}", parent.display()))
        }
        _ => Ok(()),
    }
}

/// レコードを追記する保存先。
#[cfg_attr(test, mockall::automock)]
pub trait RecordSink {
    fn kind(&self) -> SinkKind;

    /// 行をまとめて追記し、書き込んだ行数を返す。
    ///
    /// # Arguments
    ///
    /// * `rows` - `prepare_rows`で整形済みの行
    fn append_batch(&self, rows: &[PersistedRow]) -> Result<usize>;
}

/// 保存先ごとの結果。
#[derive(Debug)]
pub struct SinkOutcome {
    pub kind: SinkKind,
    pub result: Result<usize, String>,
}

/// 一括保存の結果。
#[derive(Debug, Default)]
pub struct SaveReport {
    pub outcomes: Vec<SinkOutcome>,
}

impl SaveReport {
    /// 1つ以上の保存先に書き込めたかどうか。
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().any(|outcome| outcome.result.is_ok())
    }

    /// 全ての保存先に書き込めたかどうか。
    pub fn is_complete(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }
}

/// 設定で有効になっている保存先を作成する。
pub fn configured_sinks(settings: &Settings) -> Result<Vec<Box<dyn RecordSink>>, ValidationError> {
    settings.validate_outputs()?;

    let mut sinks: Vec<Box<dyn RecordSink>> = Vec::new();
    if settings.save_txt {
        sinks.push(Box::new(TextSink::new(settings.txt_path.trim())));
    }
    if settings.save_excel {
        sinks.push(Box::new(SpreadsheetSink::new(settings.excel_path.trim())));
    }

    Ok(sinks)
}

/// 全てのレコードを各保存先に保存する。
///
/// 保存先は互いに独立に試行され、失敗しても他の保存先には影響しない。
/// 全ての保存先に書き込めた場合のみレコードを消去し、空白のレコードを1件作成する。
pub fn save_all(collection: &mut RecordCollection, sinks: &[Box<dyn RecordSink>]) -> SaveReport {
    let rows = prepare_rows(collection.entries());
    let skipped = collection.len() - rows.len();
    if skipped > 0 {
        info!("Skipping {} record(s) without description", skipped);
    }

    let outcomes = sinks
        .iter()
        .map(|sink| {
            let result = sink.append_batch(&rows).map_err(|err| {
                warn!("Failed to save to {}: {:#}", sink.kind(), err);
                format!("{:#}", err)
            });
            if let Ok(count) = result {
                info!("Saved {} row(s) to {}", count, sink.kind());
            }
            SinkOutcome {
                kind: sink.kind(),
                result,
            }
        })
        .collect();
    let report = SaveReport { outcomes };

    if report.is_complete() {
        collection.clear_all();
    }

    report
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use rstest::rstest;

    use super::{
        configured_sinks, prepare_rows, save_all, DifficultyValue, MockRecordSink, PersistedRow,
        RecordSink, SinkKind,
    };
    use crate::record::RecordCollection;
    use crate::settings::{Settings, ValidationError};

    fn collection_with(descriptions: &[&str]) -> RecordCollection {
        let mut collection = RecordCollection::new();
        let first = collection.id_at(1).unwrap();
        collection.remove(first);
        for description in descriptions {
            let id = collection.create(Some("01.01.2024".to_string()), Some("10:00".to_string()));
            collection.get_mut(id).unwrap().description = description.to_string();
        }
        collection
    }

    fn mock_sink(kind: SinkKind, succeed: bool) -> Box<dyn RecordSink> {
        let mut sink = MockRecordSink::new();
        sink.expect_kind().return_const(kind);
        sink.expect_append_batch().times(1).returning(move |rows| {
            if succeed {
                Ok(rows.len())
            } else {
                Err(anyhow!("disk full"))
            }
        });
        Box::new(sink)
    }

    #[test]
    fn test_prepare_rows_skips_blank_and_normalizes_description() {
        let collection = collection_with(&["  ", "Письмо\r\nклиенту  ", ""]);

        let rows = prepare_rows(collection.entries());

        assert_eq!(
            rows,
            vec![PersistedRow {
                date: "01.01.2024".to_string(),
                time: "10:00".to_string(),
                weekday: "пн".to_string(),
                part_of_day: "Утро".to_string(),
                task_type: "Р".to_string(),
                description: "Письмо  клиенту".to_string(),
                difficulty: "1".to_string(),
            }]
        );
    }

    #[test]
    fn test_to_tsv_keeps_field_order() {
        let collection = collection_with(&["Звонок"]);
        let rows = prepare_rows(collection.entries());

        assert_eq!(rows[0].to_tsv(), "01.01.2024\t10:00\tпн\tУтро\tР\tЗвонок\t1");
    }

    #[rstest]
    #[case::number("3", DifficultyValue::Number(3))]
    #[case::padded(" 4 ", DifficultyValue::Number(4))]
    #[case::text("abc", DifficultyValue::Text("abc".to_string()))]
    fn test_difficulty_value(#[case] raw: &str, #[case] expected: DifficultyValue) {
        assert_eq!(DifficultyValue::from_raw(raw), expected);
    }

    #[test]
    fn test_save_all_clears_collection_when_every_sink_succeeds() {
        let mut collection = collection_with(&["Отчёт", " "]);
        let sinks = vec![
            mock_sink(SinkKind::Text, true),
            mock_sink(SinkKind::Spreadsheet, true),
        ];

        let report = save_all(&mut collection, &sinks);

        assert!(report.is_success());
        assert!(report.is_complete());
        assert_eq!(report.outcomes[0].result, Ok(1));
        assert_eq!(report.outcomes[1].result, Ok(1));
        assert_eq!(collection.len(), 1);
        assert!(collection.entries()[0].is_blank());
    }

    #[test]
    fn test_save_all_attempts_every_sink_and_keeps_records_on_failure() {
        let mut collection = collection_with(&["Отчёт"]);
        let sinks = vec![
            mock_sink(SinkKind::Text, false),
            mock_sink(SinkKind::Spreadsheet, true),
        ];

        let report = save_all(&mut collection, &sinks);

        assert!(report.is_success());
        assert!(!report.is_complete());
        assert_eq!(report.outcomes[0].kind, SinkKind::Text);
        assert_eq!(report.outcomes[0].result, Err("disk full".to_string()));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.entries()[0].description, "Отчёт");
    }

    #[test]
    fn test_save_all_reports_failure_when_nothing_saved() {
        let mut collection = collection_with(&["Отчёт"]);
        let sinks = vec![mock_sink(SinkKind::Spreadsheet, false)];

        let report = save_all(&mut collection, &sinks);

        assert!(!report.is_success());
        assert_eq!(collection.entries()[0].description, "Отчёт");
    }

    #[test]
    fn test_configured_sinks_follow_settings() {
        let mut settings = Settings::default();
        settings.save_excel = false;
        settings.txt_path = "/tmp/journal.txt".to_string();

        let sinks = configured_sinks(&settings).unwrap();

        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].kind(), SinkKind::Text);
    }

    #[test]
    fn test_configured_sinks_validate_before_io() {
        let mut settings = Settings::default();
        settings.save_txt = false;
        settings.save_excel = false;

        assert_eq!(
            configured_sinks(&settings).err(),
            Some(ValidationError::NoOutputEnabled)
        );
    }
}
