use chrono::{Datelike, NaiveDate, Weekday};

/// 日付文字列の書式。
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// 時刻文字列の書式。
pub const TIME_FORMAT: &str = "%H:%M";

/// 日付が解釈できなかった場合の曜日表示。
pub const UNKNOWN_WEEKDAY: &str = "??";

/// `dd.mm.yyyy`形式の日付から2文字の曜日略称を返す。
///
/// 解釈できない場合は`"??"`を返す。
///
/// # Arguments
///
/// * `date` - `dd.mm.yyyy`形式の日付
pub fn weekday_of(date: &str) -> String {
    match NaiveDate::parse_from_str(date, DATE_FORMAT) {
        Ok(date) => weekday_label(date.weekday()).to_string(),
        Err(_) => UNKNOWN_WEEKDAY.to_string(),
    }
}

fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "пн",
        Weekday::Tue => "вт",
        Weekday::Wed => "ср",
        Weekday::Thu => "чт",
        Weekday::Fri => "пт",
        Weekday::Sat => "сб",
        Weekday::Sun => "вс",
    }
}

/// 時(0..24)から時間帯のラベルを返す。
///
/// 範囲外の値は呼び出し側で弾くこと。
pub fn part_of_day_of(hour: u32) -> &'static str {
    match hour {
        0..=8 => "До начала дня",
        9..=11 => "Утро",
        12..=14 => "Обед",
        15..=17 => "Вечер",
        _ => "После работы",
    }
}

/// `HH:MM`形式の時刻から時を取り出す。
///
/// `:`より前が0..24の整数でなければ`None`を返す。
pub fn hour_of(time: &str) -> Option<u32> {
    let (hour, _) = time.split_once(':').unwrap_or((time, ""));
    hour.trim().parse::<u32>().ok().filter(|hour| *hour < 24)
}
