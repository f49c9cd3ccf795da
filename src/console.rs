use std::io::Write;

use anyhow::{Context, Result};

use crate::derivation::DATE_FORMAT;
use crate::record::{RecordEntry, TaskType, DIFFICULTY_CHOICES};
use crate::settings::DifficultyStyle;
use crate::sink::SaveReport;
use crate::statistics::{StatisticsResult, StatisticsTable};

const NO_DATA: &str = "Нет данных для отображения";
const METRIC_WIDTH: usize = 22;
const DATE_WIDTH: usize = 12;

/// Consoleに記録や統計を表示するためのtrait。
pub trait ConsolePresenter {
    /// 編集中のレコードを表示する。
    fn show_records(&mut self, entries: &[RecordEntry]) -> Result<()>;

    /// 一括保存の結果を表示する。
    fn show_save_report(&mut self, report: &SaveReport) -> Result<()>;

    /// 最近のタスクを表示する。
    fn show_recent(&mut self, lines: &[String]) -> Result<()>;

    /// 統計を新しい日付から`days`日分表示する。
    fn show_statistics(&mut self, result: &StatisticsResult, days: usize) -> Result<()>;
}

/// プレーンテキストで表示する。
pub struct ConsoleText<'a, W: Write> {
    writer: &'a mut W,
    difficulty_style: DifficultyStyle,
}

impl<'a, W: Write> ConsoleText<'a, W> {
    /// 新しい`ConsoleText`を返す。
    pub fn new(writer: &'a mut W, difficulty_style: DifficultyStyle) -> Self {
        Self {
            writer,
            difficulty_style,
        }
    }

    /// 任意のメッセージを1行表示する。
    pub fn message(&mut self, text: &str) -> Result<()> {
        writeln!(self.writer, "{}", text).context("Failed to write message")
    }

    fn difficulty_label(&self, difficulty: &str) -> String {
        match self.difficulty_style {
            DifficultyStyle::Dropdown => format!("[{} ▾]", difficulty),
            DifficultyStyle::Buttons => DIFFICULTY_CHOICES
                .iter()
                .map(|choice| {
                    if *choice == difficulty {
                        format!("[{}]", choice)
                    } else {
                        format!(" {} ", choice)
                    }
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    fn write_table_row<T: ToString>(&mut self, label: &str, values: &[T]) -> Result<()> {
        let cells: String = values
            .iter()
            .map(|value| format!("{:>width$}", value.to_string(), width = DATE_WIDTH))
            .collect();
        writeln!(self.writer, "{:<width$}{}", label, cells, width = METRIC_WIDTH)
            .context("Failed to write statistics row")
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleText<'a, W> {
    fn show_records(&mut self, entries: &[RecordEntry]) -> Result<()> {
        if entries.is_empty() {
            return self.message("Нет записей. Команда add добавит новую.");
        }
        for (position, entry) in entries.iter().enumerate() {
            let task_types = TaskType::ALL
                .iter()
                .map(|task_type| {
                    if *task_type == entry.task_type {
                        format!("[{}]", task_type)
                    } else {
                        task_type.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(
                self.writer,
                "#{} {} {} {} {}\n   Вид задачи: {}\n   Сложность: {}\n   Описание: {}",
                position + 1,
                entry.date(),
                entry.weekday(),
                entry.time(),
                entry.part_of_day(),
                task_types,
                self.difficulty_label(&entry.difficulty),
                entry.description,
            )
            .with_context(|| format!("Failed to write record: {:?}", entry))?;
        }

        Ok(())
    }

    fn show_save_report(&mut self, report: &SaveReport) -> Result<()> {
        for outcome in &report.outcomes {
            let written = match &outcome.result {
                Ok(count) => writeln!(self.writer, "{}: сохранено записей: {}", outcome.kind, count),
                Err(err) => writeln!(self.writer, "{}: ошибка: {}", outcome.kind, err),
            };
            written.context("Failed to write save report")?;
        }
        if report.is_complete() {
            self.message("Данные сохранены!")?;
        } else if report.is_success() {
            self.message("Данные сохранены частично, записи оставлены для повторной попытки.")?;
        }

        Ok(())
    }

    fn show_recent(&mut self, lines: &[String]) -> Result<()> {
        if lines.is_empty() {
            return self.message(NO_DATA);
        }
        writeln!(self.writer, "Последние {} задач(и):", lines.len())
            .and_then(|_| writeln!(self.writer, "{}", "-".repeat(50)))
            .context("Failed to write recent tasks header")?;
        for line in lines {
            writeln!(self.writer, "{}", line).context("Failed to write recent task")?;
        }

        Ok(())
    }

    fn show_statistics(&mut self, result: &StatisticsResult, days: usize) -> Result<()> {
        if let Some(error) = &result.error {
            self.message("Ошибка получения статистики:")?;
            return self.message(error);
        }

        let table = StatisticsTable::from_result(result, days);
        if table.dates.is_empty() {
            return self.message(NO_DATA);
        }

        let headers: Vec<String> = table
            .dates
            .iter()
            .map(|date| date.format(DATE_FORMAT).to_string())
            .collect();
        self.write_table_row("Показатель", &headers)?;
        self.write_table_row("Всего записей:", &table.total_count)?;
        self.write_table_row("Сумма сложностей:", &table.total_difficulty)?;
        self.message("")?;
        self.message("Сложность по типам:")?;
        for (task_type, values) in &table.by_type {
            self.write_table_row(&format!("  - {}", task_type), values)?;
        }

        Ok(())
    }
}
