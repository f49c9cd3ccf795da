use std::io::Write;

use anyhow::{bail, Context, Result};
use log::info;

use crate::console::{ConsolePresenter, ConsoleText};
use crate::record::{RecordCollection, TaskType};
use crate::settings::Settings;
use crate::sink::{configured_sinks, save_all};

/// 1件のレコードを保存するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct AddArgs {
    #[clap(short = 'm', long = "description", help = "Task description")]
    description: String,

    #[clap(short = 'd', long = "date", help = "Sets a custom date in the format DD.MM.YYYY")]
    date: Option<String>,

    #[clap(short = 't', long = "time", help = "Sets a custom time in the format HH:MM")]
    time: Option<String>,

    #[clap(
        short = 'k',
        long = "type",
        help = "Task type code: У, Р, ОК, Л, ЗП, ГК, КК"
    )]
    task_type: Option<TaskType>,

    #[clap(short = 'x', long = "difficulty", help = "Difficulty from 0 to 5", default_value = "1")]
    difficulty: String,
}

pub struct AddCommand<'a> {
    settings: &'a Settings,
}

impl<'a> AddCommand<'a> {
    /// 新しい`AddCommand`を返す。
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// `add`サブコマンドの処理を行う。
    ///
    /// 日付と時刻が指定されていない場合は現在の日時を利用する。
    /// 全ての保存先に書き込めなかった場合はエラーを返す。
    ///
    /// # Arguments
    ///
    /// * `args` - `add`サブコマンドの引数
    /// * `output` - 結果の出力先
    pub fn run<W: Write>(&self, args: AddArgs, output: &mut W) -> Result<()> {
        let sinks = configured_sinks(self.settings)?;

        let mut collection = RecordCollection::new();
        let id = collection.id_at(1).context("Form has no record")?;
        let entry = collection.get_mut(id).context("Form has no record")?;
        if let Some(date) = args.date {
            entry.set_date(date);
        }
        if let Some(time) = args.time {
            entry.set_time(time);
        }
        entry.task_type = args.task_type.unwrap_or_default();
        entry.set_difficulty(&args.difficulty)?;
        entry.description = args.description;
        if entry.is_blank() {
            bail!("Description must not be empty");
        }
        info!("Adding record: {:?}", entry);

        let report = save_all(&mut collection, &sinks);
        ConsoleText::new(output, self.settings.difficulty_style).show_save_report(&report)?;
        if !report.is_complete() {
            bail!("Failed to save to every configured output");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;
    use clap::Parser;
    use tempfile::tempdir;

    use super::{AddArgs, AddCommand};
    use crate::datetime::mock_datetime;
    use crate::settings::Settings;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[clap(flatten)]
        args: AddArgs,
    }

    fn parse(args: &[&str]) -> AddArgs {
        TestCli::parse_from(std::iter::once("add").chain(args.iter().copied())).args
    }

    fn settings_in(dir: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.txt_path = dir.join("journal.txt").to_string_lossy().into_owned();
        settings.excel_path = dir.join("journal.xlsx").to_string_lossy().into_owned();
        settings
    }

    #[test]
    fn test_add_writes_both_outputs() {
        mock_datetime::set_mock_time(
            NaiveDate::from_ymd_opt(2024, 1, 4)
                .unwrap()
                .and_hms_opt(18, 10, 0)
                .unwrap(),
        );
        let dir = tempdir().unwrap();
        let settings = settings_in(dir.path());
        let mut output = Vec::new();

        AddCommand::new(&settings)
            .run(parse(&["-m", "Ведомость", "-k", "ЗП", "-x", "2"]), &mut output)
            .unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("journal.txt")).unwrap(),
            "04.01.2024\t18:10\tчт\tПосле работы\tЗП\tВедомость\t2\n"
        );
        assert!(dir.path().join("journal.xlsx").exists());
    }

    #[test]
    fn test_add_with_explicit_date_and_time() {
        let dir = tempdir().unwrap();
        let mut settings = settings_in(dir.path());
        settings.save_excel = false;
        let mut output = Vec::new();

        AddCommand::new(&settings)
            .run(
                parse(&["-m", "Планёрка", "-d", "01.01.2024", "-t", "09:00"]),
                &mut output,
            )
            .unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("journal.txt")).unwrap(),
            "01.01.2024\t09:00\tпн\tУтро\tР\tПланёрка\t1\n"
        );
    }

    #[test]
    fn test_add_rejects_blank_description_and_bad_difficulty() {
        let dir = tempdir().unwrap();
        let settings = settings_in(dir.path());
        let mut output = Vec::new();
        let command = AddCommand::new(&settings);

        assert!(command.run(parse(&["-m", "   "]), &mut output).is_err());
        assert!(command.run(parse(&["-m", "a", "-x", "9"]), &mut output).is_err());
        assert!(!dir.path().join("journal.txt").exists());
    }
}
