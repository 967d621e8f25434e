use chrono::DateTime;
use prettytable::{Cell, Row, Table, format};

use kamikaze_storage::Package;

pub const HEADERS: [&str; 4] = ["Score", "Payload", "Expire Time", "TTL (secs)"];

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Uma linha por pacote, na ordem recebida.
pub fn package_rows(packages: &[Package], now: f64) -> Vec<Vec<String>> {
    packages
        .iter()
        .map(|p| {
            vec![
                p.score().to_string(),
                p.payload().to_string(),
                format_expire_time(p.expire_time()),
                format_ttl(p.ttl(now)),
            ]
        })
        .collect()
}

/// Renderiza as linhas com prettytable. Com `titles` a tabela ganha cabeçalho
/// e separador; sem, sai só o conteúdo alinhado, bom para pipes.
pub fn render_table(rows: &[Vec<String>], titles: bool) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    if titles {
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(Row::new(HEADERS.iter().map(|h| Cell::new(h)).collect()));
    } else {
        table.set_format(*format::consts::FORMAT_CLEAN);
    }

    for row in rows {
        table.add_row(Row::new(row.iter().map(|c| Cell::new(c)).collect()));
    }
    table.to_string()
}

/// Instante em UTC; `-` quando o pacote não expira.
pub fn format_expire_time(expire_time: Option<f64>) -> String {
    let Some(t) = expire_time else {
        return "-".into();
    };
    match DateTime::from_timestamp_millis((t * 1000.0).round() as i64) {
        Some(dt) => dt.format(TIME_FORMAT).to_string(),
        None => t.to_string(),
    }
}

pub fn format_ttl(ttl: Option<f64>) -> String {
    match ttl {
        Some(ttl) => format!("{ttl:.3}"),
        None => "-".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expire_time_is_utc() {
        assert_eq!(format_expire_time(Some(0.0)), "1970-01-01T00:00:00");
        assert_eq!(format_expire_time(Some(1_700_000_000.25)), "2023-11-14T22:13:20");
        assert_eq!(format_expire_time(None), "-");
    }

    #[test]
    fn ttl_has_three_decimals() {
        assert_eq!(format_ttl(Some(1.23456)), "1.235");
        assert_eq!(format_ttl(Some(-1.0)), "-1.000");
        assert_eq!(format_ttl(None), "-");
    }

    #[test]
    fn rows_follow_package_order() {
        let packages = vec![
            Package::new("red", Some(21.0), 3.0),
            Package::new("forever", None, 5.0),
        ];

        let rows = package_rows(&packages, 20.0);

        assert_eq!(rows[0], vec!["3", "red", "1970-01-01T00:00:21", "1.000"]);
        assert_eq!(rows[1], vec!["5", "forever", "-", "-"]);
    }

    #[test]
    fn titles_only_on_request() {
        let rows = package_rows(&[Package::new("red", None, 3.0)], 0.0);

        let piped = render_table(&rows, false);
        assert!(piped.contains("red"));
        assert!(!piped.contains("Payload"));

        let tty = render_table(&rows, true);
        assert!(tty.contains("Payload"));
        assert!(tty.contains("TTL (secs)"));
    }

    #[test]
    fn empty_queue_renders_nothing() {
        assert_eq!(render_table(&[], true), "");
    }
}
