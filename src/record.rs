use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::Timelike;
use log::debug;

use crate::datetime;
use crate::derivation::{hour_of, part_of_day_of, weekday_of, DATE_FORMAT, TIME_FORMAT};

/// 新規レコードの難度。
pub const DEFAULT_DIFFICULTY: &str = "1";

/// フォームで選択できる難度。
pub const DIFFICULTY_CHOICES: [&str; 6] = ["0", "1", "2", "3", "4", "5"];

/// タスクの種類。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TaskType {
    Management,
    #[default]
    Routine,
    Company,
    Personal,
    Payroll,
    StateContract,
    Team,
}

impl TaskType {
    pub const ALL: [TaskType; 7] = [
        TaskType::Management,
        TaskType::Routine,
        TaskType::Company,
        TaskType::Personal,
        TaskType::Payroll,
        TaskType::StateContract,
        TaskType::Team,
    ];

    /// 記録されるコード。
    pub fn code(self) -> &'static str {
        match self {
            TaskType::Management => "У",
            TaskType::Routine => "Р",
            TaskType::Company => "ОК",
            TaskType::Personal => "Л",
            TaskType::Payroll => "ЗП",
            TaskType::StateContract => "ГК",
            TaskType::Team => "КК",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TaskType::Management => "Управленческая задача",
            TaskType::Routine => "рутина, текучка",
            TaskType::Company => "Обще-кристовская задача",
            TaskType::Personal => "Личные дела",
            TaskType::Payroll => "Зарплаты сотрудников",
            TaskType::StateContract => "Работы по сдаче документов ГК",
            TaskType::Team => "Криста Команда",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TaskType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().to_uppercase();
        match TaskType::ALL.iter().find(|task_type| task_type.code() == code) {
            Some(task_type) => Ok(*task_type),
            None => bail!("Unknown task type: {}", s),
        }
    }
}

/// コレクション内でレコードを識別するハンドル。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

/// 入力フォーム上の1件のレコード。
///
/// `weekday`と`part_of_day`は`date`と`time`から導出されるため、
/// 直接は変更できない。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordEntry {
    id: RecordId,
    date: String,
    time: String,
    weekday: String,
    part_of_day: String,
    pub task_type: TaskType,
    pub description: String,
    pub difficulty: String,
}

impl RecordEntry {
    fn new(id: RecordId, date: Option<String>, time: Option<String>) -> Self {
        let now = datetime::now();
        let date = date.unwrap_or_else(|| now.format(DATE_FORMAT).to_string());
        let time = time.unwrap_or_else(|| now.format(TIME_FORMAT).to_string());
        let hour = hour_of(&time).unwrap_or_else(|| now.hour());

        Self {
            id,
            weekday: weekday_of(&date),
            part_of_day: part_of_day_of(hour).to_string(),
            date,
            time,
            task_type: TaskType::default(),
            description: String::new(),
            difficulty: DEFAULT_DIFFICULTY.to_string(),
        }
    }

    #[cfg(test)]
    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn weekday(&self) -> &str {
        &self.weekday
    }

    pub fn part_of_day(&self) -> &str {
        &self.part_of_day
    }

    /// 日付を変更し、曜日を再計算する。
    pub fn set_date(&mut self, date: impl Into<String>) {
        self.date = date.into();
        self.weekday = weekday_of(&self.date);
        debug!("Record {:?}: date={}, weekday={}", self.id, self.date, self.weekday);
    }

    /// 時刻を変更し、時間帯を再計算する。
    ///
    /// 時刻が解釈できない場合、時間帯は以前の値のままとする。
    pub fn set_time(&mut self, time: impl Into<String>) {
        self.time = time.into();
        if let Some(hour) = hour_of(&self.time) {
            self.part_of_day = part_of_day_of(hour).to_string();
        }
        debug!("Record {:?}: time={}, part_of_day={}", self.id, self.time, self.part_of_day);
    }

    /// 時刻を1時間戻す。
    ///
    /// 0時の前は23時とする。`H:M`として解釈できない場合は`00:00`にする。
    pub fn subtract_hour(&mut self) {
        let parsed = self
            .time
            .split_once(':')
            .and_then(|(hour, minute)| {
                Some((
                    hour.trim().parse::<i64>().ok()?,
                    minute.trim().parse::<i64>().ok()?,
                ))
            });
        let time = match parsed {
            Some((hour, minute)) => format!("{:02}:{:02}", (hour - 1).rem_euclid(24), minute),
            None => "00:00".to_string(),
        };
        self.set_time(time);
    }

    /// 難度を変更する。
    ///
    /// フォームからは0..=5のみを受け付ける。
    pub fn set_difficulty(&mut self, difficulty: &str) -> Result<()> {
        let difficulty = difficulty.trim();
        if !DIFFICULTY_CHOICES.contains(&difficulty) {
            bail!("Difficulty must be one of 0..5, got: {}", difficulty);
        }
        self.difficulty = difficulty.to_string();
        Ok(())
    }

    /// 全ての項目を初期値に戻す。
    pub fn reset(&mut self) {
        let now = datetime::now();
        self.set_date(now.format(DATE_FORMAT).to_string());
        self.set_time(now.format(TIME_FORMAT).to_string());
        self.task_type = TaskType::default();
        self.difficulty = DEFAULT_DIFFICULTY.to_string();
        self.description.clear();
    }

    /// 説明が空白のみかどうか。
    pub fn is_blank(&self) -> bool {
        self.description.trim().is_empty()
    }
}

/// 編集中のレコードの集合。
///
/// `clear_all`の後は必ず空白のレコードが1件残る。
#[derive(Debug, Default)]
pub struct RecordCollection {
    entries: Vec<RecordEntry>,
    next_id: u64,
}

impl RecordCollection {
    /// 空白のレコードを1件持つ`RecordCollection`を返す。
    pub fn new() -> Self {
        let mut collection = Self::default();
        collection.create(None, None);
        collection
    }

    /// 新しいレコードを末尾に追加し、そのハンドルを返す。
    ///
    /// # Arguments
    ///
    /// * `date` - 日付。`None`の場合は現在の日付
    /// * `time` - 時刻。`None`の場合は現在の時刻
    pub fn create(&mut self, date: Option<String>, time: Option<String>) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        self.entries.push(RecordEntry::new(id, date, time));
        id
    }

    #[cfg(test)]
    pub fn get(&self, id: RecordId) -> Option<&RecordEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut RecordEntry> {
        self.entries.iter_mut().find(|entry| entry.id == id)
    }

    /// 表示順(1始まり)からハンドルを引く。
    pub fn id_at(&self, position: usize) -> Option<RecordId> {
        position
            .checked_sub(1)
            .and_then(|index| self.entries.get(index))
            .map(|entry| entry.id)
    }

    /// レコードを取り除く。存在しない場合は`None`を返す。
    pub fn remove(&mut self, id: RecordId) -> Option<RecordEntry> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(index))
    }

    /// 全てのレコードを取り除き、空白のレコードを1件作成する。
    pub fn clear_all(&mut self) -> RecordId {
        self.entries.clear();
        self.create(None, None)
    }

    pub fn entries(&self) -> &[RecordEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rstest::rstest;

    use super::{RecordCollection, TaskType};
    use crate::datetime::mock_datetime;

    fn set_now(day: u32, hour: u32, minute: u32) {
        mock_datetime::set_mock_time(
            NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(hour, minute, 0)
                .unwrap(),
        );
    }

    #[test]
    fn test_new_collection_has_blank_record_with_defaults() {
        set_now(3, 13, 5);
        let collection = RecordCollection::new();

        assert_eq!(collection.len(), 1);
        let entry = &collection.entries()[0];
        assert_eq!(entry.date(), "03.01.2024");
        assert_eq!(entry.time(), "13:05");
        assert_eq!(entry.weekday(), "ср");
        assert_eq!(entry.part_of_day(), "Обед");
        assert_eq!(entry.task_type, TaskType::Routine);
        assert_eq!(entry.difficulty, "1");
        assert!(entry.is_blank());
    }

    #[test]
    fn test_create_with_explicit_date_and_time() {
        set_now(3, 13, 5);
        let mut collection = RecordCollection::new();
        let id = collection.create(Some("06.01.2024".to_string()), Some("08:15".to_string()));

        let entry = collection.get(id).unwrap();
        assert_eq!(entry.weekday(), "сб");
        assert_eq!(entry.part_of_day(), "До начала дня");
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.id_at(2), Some(id));
    }

    #[test]
    fn test_create_with_unparsable_time_uses_current_hour() {
        set_now(3, 19, 0);
        let mut collection = RecordCollection::new();
        let id = collection.create(None, Some("вечером".to_string()));

        assert_eq!(collection.get(id).unwrap().part_of_day(), "После работы");
    }

    #[rstest]
    #[case::valid("05.01.2024", "пт")]
    #[case::invalid("5 января", "??")]
    fn test_set_date_updates_weekday_only(#[case] date: &str, #[case] weekday: &str) {
        set_now(3, 10, 0);
        let mut collection = RecordCollection::new();
        let id = collection.id_at(1).unwrap();
        let entry = collection.get_mut(id).unwrap();

        entry.set_date(date);

        assert_eq!(entry.date(), date);
        assert_eq!(entry.weekday(), weekday);
        assert_eq!(entry.time(), "10:00");
        assert_eq!(entry.part_of_day(), "Утро");
    }

    #[rstest]
    #[case::evening("16:40", "Вечер")]
    #[case::boundary("12:00", "Обед")]
    #[case::unparsable("обед", "Утро")]
    #[case::out_of_range("25:00", "Утро")]
    fn test_set_time_updates_part_of_day_only(#[case] time: &str, #[case] part_of_day: &str) {
        set_now(3, 10, 0);
        let mut collection = RecordCollection::new();
        let id = collection.id_at(1).unwrap();
        let entry = collection.get_mut(id).unwrap();

        entry.set_time(time);

        assert_eq!(entry.time(), time);
        assert_eq!(entry.part_of_day(), part_of_day);
        assert_eq!(entry.weekday(), "ср");
    }

    #[rstest]
    #[case::regular("10:30", "09:30", "Утро")]
    #[case::wraps_midnight("00:15", "23:15", "После работы")]
    #[case::pads_digits("9:5", "08:05", "До начала дня")]
    #[case::unparsable("abc", "00:00", "До начала дня")]
    fn test_subtract_hour(#[case] time: &str, #[case] expected: &str, #[case] part_of_day: &str) {
        set_now(3, 10, 0);
        let mut collection = RecordCollection::new();
        let id = collection.id_at(1).unwrap();
        let entry = collection.get_mut(id).unwrap();
        entry.set_time(time);

        entry.subtract_hour();

        assert_eq!(entry.time(), expected);
        assert_eq!(entry.part_of_day(), part_of_day);
    }

    #[rstest]
    #[case("0", true)]
    #[case("5", true)]
    #[case(" 3 ", true)]
    #[case("6", false)]
    #[case("-1", false)]
    #[case("много", false)]
    fn test_set_difficulty(#[case] value: &str, #[case] accepted: bool) {
        let mut collection = RecordCollection::new();
        let id = collection.id_at(1).unwrap();
        let entry = collection.get_mut(id).unwrap();

        assert_eq!(entry.set_difficulty(value).is_ok(), accepted);
        if !accepted {
            assert_eq!(entry.difficulty, "1");
        }
    }

    #[test]
    fn test_reset_restores_defaults_and_is_idempotent() {
        set_now(3, 10, 0);
        let mut collection = RecordCollection::new();
        let id = collection.id_at(1).unwrap();
        {
            let entry = collection.get_mut(id).unwrap();
            entry.set_date("01.01.2024");
            entry.set_time("19:00");
            entry.task_type = TaskType::Payroll;
            entry.difficulty = "4".to_string();
            entry.description = "Отчёт".to_string();
        }

        set_now(4, 16, 20);
        collection.get_mut(id).unwrap().reset();
        let once = collection.get(id).unwrap().clone();
        collection.get_mut(id).unwrap().reset();
        let twice = collection.get(id).unwrap().clone();

        assert_eq!(once, twice);
        assert_eq!(once.date(), "04.01.2024");
        assert_eq!(once.time(), "16:20");
        assert_eq!(once.weekday(), "чт");
        assert_eq!(once.part_of_day(), "Вечер");
        assert_eq!(once.task_type, TaskType::Routine);
        assert_eq!(once.difficulty, "1");
        assert!(once.description.is_empty());
        assert_eq!(once.id(), id);
    }

    #[test]
    fn test_remove_detaches_entry() {
        let mut collection = RecordCollection::new();
        let first = collection.id_at(1).unwrap();
        let second = collection.create(None, None);

        let removed = collection.remove(first).unwrap();

        assert_eq!(removed.id(), first);
        assert!(collection.get(first).is_none());
        assert_eq!(collection.id_at(1), Some(second));
        assert!(collection.remove(first).is_none());
    }

    #[test]
    fn test_clear_all_leaves_one_fresh_record() {
        let mut collection = RecordCollection::new();
        let first = collection.id_at(1).unwrap();
        collection.create(None, None);
        collection.create(None, None);

        let fresh = collection.clear_all();

        assert_eq!(collection.len(), 1);
        assert_ne!(fresh, first);
        assert!(collection.get(fresh).unwrap().is_blank());
    }

    #[rstest]
    #[case("Р", TaskType::Routine)]
    #[case("ок", TaskType::Company)]
    #[case(" ЗП ", TaskType::Payroll)]
    #[case("кк", TaskType::Team)]
    fn test_task_type_from_code(#[case] code: &str, #[case] expected: TaskType) {
        assert_eq!(code.parse::<TaskType>().unwrap(), expected);
    }

    #[test]
    fn test_task_type_unknown_code() {
        assert!("X".parse::<TaskType>().is_err());
    }
}
