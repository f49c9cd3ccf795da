use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};

use crate::console::{ConsolePresenter, ConsoleText};
use crate::record::{RecordCollection, RecordEntry, RecordId, TaskType};
use crate::settings::Settings;
use crate::sink::{configured_sinks, save_all};
use crate::statistics::{compute_statistics, StatisticsColumns};
use crate::text_sink::read_last_lines;

const HELP: &str = "\
Команды:
  list                     показать записи
  add                      добавить запись
  date N ДД.ММ.ГГГГ        изменить дату
  time N ЧЧ:ММ             изменить время
  minus-hour N             время на час назад
  type N КОД               вид задачи (У, Р, ОК, Л, ЗП, ГК, КК)
  types                    список видов задач
  difficulty N 0..5        сложность
  desc N ТЕКСТ             описание
  reset N                  сбросить запись
  remove N                 удалить запись
  save                     сохранить всё
  stats                    статистика
  recent                   последние задачи
  quit                     выход";

/// 対話モードのコマンド。`usize`はレコードの表示順(1始まり)。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    List,
    Add,
    Date(usize, String),
    Time(usize, String),
    MinusHour(usize),
    Type(usize, TaskType),
    Types,
    Difficulty(usize, String),
    Description(usize, String),
    Reset(usize),
    Remove(usize),
    Save,
    Stats,
    Recent,
    Help,
    Quit,
}

impl Command {
    /// 1行の入力を解釈する。
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let (position, argument) = split_position(rest);

        let command = match name {
            "list" | "ls" => Command::List,
            "add" => Command::Add,
            "date" => Command::Date(position?, required(argument)?),
            "time" => Command::Time(position?, required(argument)?),
            "minus-hour" => Command::MinusHour(position?),
            "type" => Command::Type(position?, required(argument)?.parse()?),
            "types" => Command::Types,
            "difficulty" => Command::Difficulty(position?, required(argument)?),
            "desc" => Command::Description(position?, argument.to_string()),
            "reset" => Command::Reset(position?),
            "remove" | "rm" => Command::Remove(position?),
            "save" => Command::Save,
            "stats" => Command::Stats,
            "recent" => Command::Recent,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "" => bail!("Empty command"),
            other => bail!("Unknown command: {}", other),
        };

        Ok(command)
    }
}

fn split_position(rest: &str) -> (Result<usize>, &str) {
    let rest = rest.trim_start();
    let (position, argument) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let position = position
        .parse::<usize>()
        .map_err(|_| anyhow!("Expected a record number, got: {:?}", position));
    (position, argument.trim())
}

fn required(argument: &str) -> Result<String> {
    if argument.is_empty() {
        bail!("Missing value");
    }
    Ok(argument.to_string())
}

/// 入力フォームの対話セッション。
pub struct Session<'a> {
    settings: &'a Settings,
    collection: RecordCollection,
}

impl<'a> Session<'a> {
    /// 空白のレコードを1件持つ`Session`を返す。
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            collection: RecordCollection::new(),
        }
    }

    #[cfg(test)]
    pub fn collection(&self) -> &RecordCollection {
        &self.collection
    }

    /// `quit`か入力の終わりまでコマンドを処理する。
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, output: &mut W) -> Result<()> {
        let mut presenter = ConsoleText::new(output, self.settings.difficulty_style);
        presenter.message(HELP)?;
        self.show_recent(&mut presenter)?;
        presenter.show_records(self.collection.entries())?;

        for line in input.lines() {
            let line = line.context("Failed to read command")?;
            if line.trim().is_empty() {
                continue;
            }
            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(err) => {
                    presenter.message(&format!("Ошибка: {:#}", err))?;
                    continue;
                }
            };
            debug!("Command: {:?}", command);
            if command == Command::Quit {
                break;
            }
            if let Err(err) = self.execute(command, &mut presenter) {
                presenter.message(&format!("Ошибка: {:#}", err))?;
            }
        }

        info!("Session finished");
        Ok(())
    }

    fn execute<W: Write>(&mut self, command: Command, presenter: &mut ConsoleText<W>) -> Result<()> {
        match command {
            Command::List => presenter.show_records(self.collection.entries())?,
            Command::Add => {
                self.collection.create(None, None);
                presenter.show_records(self.collection.entries())?;
            }
            Command::Date(position, date) => self.entry_mut(position)?.set_date(date),
            Command::Time(position, time) => self.entry_mut(position)?.set_time(time),
            Command::MinusHour(position) => self.entry_mut(position)?.subtract_hour(),
            Command::Type(position, task_type) => self.entry_mut(position)?.task_type = task_type,
            Command::Types => {
                for task_type in TaskType::ALL {
                    presenter.message(&format!("{:<3} {}", task_type.code(), task_type.description()))?;
                }
            }
            Command::Difficulty(position, value) => self.entry_mut(position)?.set_difficulty(&value)?,
            Command::Description(position, text) => self.entry_mut(position)?.description = text,
            Command::Reset(position) => self.entry_mut(position)?.reset(),
            Command::Remove(position) => {
                let id = self.id_at(position)?;
                self.collection.remove(id);
                presenter.show_records(self.collection.entries())?;
            }
            Command::Save => self.save(presenter)?,
            Command::Stats => {
                let path = Path::new(self.settings.excel_path.trim());
                let result = compute_statistics(Some(path), StatisticsColumns::default());
                presenter.show_statistics(&result, self.settings.stats_days() as usize)?;
            }
            Command::Recent => self.show_recent(presenter)?,
            Command::Help => presenter.message(HELP)?,
            Command::Quit => {}
        }

        Ok(())
    }

    fn save<W: Write>(&mut self, presenter: &mut ConsoleText<W>) -> Result<()> {
        let sinks = configured_sinks(self.settings)?;
        let report = save_all(&mut self.collection, &sinks);
        presenter.show_save_report(&report)?;
        if report.is_complete() {
            self.show_recent(presenter)?;
            presenter.show_records(self.collection.entries())?;
        }

        Ok(())
    }

    fn show_recent<W: Write>(&self, presenter: &mut ConsoleText<W>) -> Result<()> {
        let lines = read_last_lines(
            Path::new(self.settings.txt_path.trim()),
            self.settings.recent_count() as usize,
        );
        presenter.show_recent(&lines)
    }

    fn id_at(&self, position: usize) -> Result<RecordId> {
        self.collection
            .id_at(position)
            .ok_or_else(|| anyhow!("Нет записи с номером {}", position))
    }

    fn entry_mut(&mut self, position: usize) -> Result<&mut RecordEntry> {
        let id = self.id_at(position)?;
        self.collection
            .get_mut(id)
            .ok_or_else(|| anyhow!("Нет записи с номером {}", position))
    }
}
