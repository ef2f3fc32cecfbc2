//! Human-presentable receipt numbers, e.g. `RCP-20261019-4F3A9C`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const RECEIPT_PREFIX: &str = "RCP";
const RANDOM_SUFFIX_LEN: usize = 6;

pub fn generate_receipt_number(now: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(RANDOM_SUFFIX_LEN)
        .collect();

    format!(
        "{}-{}-{}",
        RECEIPT_PREFIX,
        now.format("%Y%m%d"),
        suffix.to_ascii_uppercase()
    )
}
