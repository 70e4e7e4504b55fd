//! SQL generation for the access-log table.

use s3logs2parquet_core::DateRange;

/// Columns of the summary projection. The key is also split into its first
/// four path segments so they can be grouped on without string functions.
pub const SUMMARY_COLUMNS: &str = "requestid, operation, \
SPLIT_PART(key, '/', 1) AS dir, \
SPLIT_PART(key, '/', 2) AS folder, \
SPLIT_PART(key, '/', 3) AS category, \
SPLIT_PART(key, '/', 4) AS geom_type, \
key, referrer, objectsize, httpstatus, requestdatetime, timestamp, remoteip";

/// SELECT over the partitioned log table for `range`.
///
/// `timestamp` is the `yyyy/MM/dd` partition projection column, so the
/// inclusive BETWEEN on formatted dates prunes partitions.
pub fn fetch_query(database: &str, table: &str, range: &DateRange, select_all: bool) -> String {
    let (start, end) = range.partition_bounds();
    let projection = if select_all { "*" } else { SUMMARY_COLUMNS };
    format!(
        "SELECT {projection}\nFROM {}.{}\nWHERE key != '-' AND (timestamp BETWEEN '{start}' AND '{end}');",
        quote_identifier(database),
        quote_identifier(table),
    )
}

/// Wrap `sql` in an UNLOAD writing gzip-compressed Parquet under
/// `destination` (an `s3://` directory that must not exist yet).
pub fn unload_query(sql: &str, destination: &str) -> String {
    let inner = sql.trim().trim_end_matches(';').trim_end();
    format!(
        "UNLOAD ({inner})\nTO '{}'\nWITH (format = 'parquet', compression = 'gzip')",
        destination.replace('\'', "''")
    )
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn february() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn summary_projection_with_partition_predicate() {
        let sql = fetch_query("logs_db", "access", &february(), false);
        assert!(sql.starts_with("SELECT requestid, operation, SPLIT_PART(key, '/', 1) AS dir"));
        assert!(sql.contains("FROM \"logs_db\".\"access\""));
        assert!(sql.contains("WHERE key != '-' AND (timestamp BETWEEN '2024/02/01' AND '2024/02/29');"));
        assert!(!sql.contains("bytessent"));
    }

    #[test]
    fn select_all_uses_star() {
        let sql = fetch_query("db", "t", &february(), true);
        assert!(sql.starts_with("SELECT *\n"));
    }

    #[test]
    fn identifiers_are_quoted() {
        let sql = fetch_query("my\"db", "t", &february(), true);
        assert!(sql.contains("\"my\"\"db\".\"t\""));
    }

    #[test]
    fn unload_strips_trailing_semicolon() {
        let sql = unload_query(
            "SELECT * FROM t;  \n",
            "s3://results/athena/results/meta/dataset/abc/",
        );
        assert_eq!(
            sql,
            "UNLOAD (SELECT * FROM t)\nTO 's3://results/athena/results/meta/dataset/abc/'\n\
             WITH (format = 'parquet', compression = 'gzip')"
        );
    }
}
