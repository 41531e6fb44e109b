use chrono::{DateTime, Local};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use foodmap_core::models::FoodItem;

pub(crate) fn print_item_table(items: &[FoodItem]) {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "City")]
        city: String,
        #[tabled(rename = "Rating")]
        rating: String,
        #[tabled(rename = "Type")]
        food_type: String,
        #[tabled(rename = "Photos")]
        photos: usize,
        #[tabled(rename = "Tags")]
        tags: String,
        #[tabled(rename = "Added")]
        added: String,
    }

    let rows: Vec<ItemRow> = items
        .iter()
        .map(|i| ItemRow {
            id: i.id,
            name: format!(
                "{}{}",
                truncate(&i.name, 30),
                if i.is_imported { " *" } else { "" }
            ),
            city: truncate(&i.city, 16),
            rating: format!("{:.1}", i.rating),
            food_type: truncate(&i.food_type, 14),
            photos: i.photo_ids.len(),
            tags: truncate(&i.tags.join(", "), 24),
            added: format_timestamp(&i.created_at),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .with(Modify::new(Columns::new(5..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    if items.iter().any(|i| i.is_imported) {
        println!("* imported");
    }
}

/// Stored timestamps are UTC; show them as local minutes.
pub(crate) fn format_timestamp(ts: &str) -> String {
    DateTime::parse_from_rfc3339(ts).map_or_else(
        |_| ts.to_string(),
        |dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a missing record and exit with status 2.
pub(crate) fn not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max.saturating_sub(3)).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// Show only the first four characters of a secret.
pub(crate) fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    if key.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
        assert_eq!(truncate("hello", 2), "...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème brûlée café", 10), "Crème b...");
        assert_eq!(truncate("麻辣烫", 10), "麻辣烫");
        assert_eq!(truncate("成都老码头火锅店", 6), "成都老...");
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("abcdef123456"), "abcd****");
        assert_eq!(mask_key("abc"), "****");
    }

    #[test]
    fn test_format_timestamp_falls_back_to_raw() {
        assert_eq!(format_timestamp("not a time"), "not a time");
        let formatted = format_timestamp("2024-03-01T12:30:00.000000Z");
        assert_eq!(formatted.len(), "2024-03-01 12:30".len());
    }

    #[test]
    fn test_json_error_escapes() {
        let s = json_error("bad \"quote\"");
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["error"], "bad \"quote\"");
    }
}
