use chrono::{Local, NaiveDateTime};

#[cfg(not(test))]
/// 現在のLocal時間を取得する。
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}


#[cfg(test)]
pub use mock_datetime::now;
