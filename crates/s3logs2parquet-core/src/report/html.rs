use std::fmt::Write;

use super::format::{escape_html, int_comma, natural_size, title_case};
use super::metrics::{PeriodMetrics, RankedCount, UsageReport};
use super::ReportContext;

const CELL: &str = "border: 1px solid #ddd; padding: 12px 15px;";
const HEADER_CELL: &str = "border: 1px solid #ddd; padding: 12px 15px; text-align: left; \
    background-color: #D73F3F; color: #ffffff; font-size: 16px;";
const SUB_CELL: &str = "border: 1px solid #ddd; padding: 8px 15px;";

enum Entry<'a> {
    Scalar(&'static str, String),
    Ranked(&'static str, &'a [RankedCount]),
}

fn entries(m: &PeriodMetrics) -> Vec<Entry<'_>> {
    let mut rows = vec![
        Entry::Scalar(
            "total_overall_interactions_count",
            int_comma(m.total_overall_interactions_count),
        ),
        Entry::Scalar(
            "total_files_downloads_count",
            int_comma(m.total_files_downloads_count),
        ),
        Entry::Scalar(
            "total_unique_files_downloaded",
            int_comma(m.total_unique_files_downloaded),
        ),
        Entry::Scalar(
            "total_dataset_uploaded_count",
            int_comma(m.total_dataset_uploaded_count),
        ),
        Entry::Scalar(
            "total_dataset_downloaded_size",
            natural_size(m.total_dataset_downloaded_size),
        ),
        Entry::Scalar(
            "total_dataset_uploaded_size",
            natural_size(m.total_dataset_uploaded_size),
        ),
        Entry::Scalar("unique_users_overall", int_comma(m.unique_users_overall)),
        Entry::Scalar(
            "unique_users_by_download",
            int_comma(m.unique_users_by_download),
        ),
        Entry::Ranked("popular_files_by_download", &m.popular_files_by_download),
        Entry::Ranked("top_referrers_by_download", &m.top_referrers_by_download),
    ];

    for (name, list) in [
        ("popular_projects_by_download", &m.popular_projects_by_download),
        ("popular_features_by_download", &m.popular_features_by_download),
        (
            "popular_fileformats_by_download",
            &m.popular_fileformats_by_download,
        ),
    ] {
        if !list.is_empty() {
            rows.push(Entry::Ranked(name, list));
        }
    }

    rows
}

fn summary_sentence(m: &PeriodMetrics, title: &str) -> String {
    format!(
        "Throughout this period, {title} received {interactions} interactions from {users} \
         unique users, including data views, downloads, and metadata queries. Out of {users} \
         users, a total of {download_users} unique users downloaded {files} files {downloads} \
         times, amounting to {download_size} of data. Moreover, {uploads} files were updated, \
         adding up to {upload_size} of content.",
        title = title,
        interactions = int_comma(m.total_overall_interactions_count),
        users = int_comma(m.unique_users_overall),
        download_users = int_comma(m.unique_users_by_download),
        files = int_comma(m.total_unique_files_downloaded),
        downloads = int_comma(m.total_files_downloads_count),
        download_size = natural_size(m.total_dataset_downloaded_size),
        uploads = int_comma(m.total_dataset_uploaded_count),
        upload_size = natural_size(m.total_dataset_uploaded_size),
    )
}

fn metrics_table(out: &mut String, m: &PeriodMetrics, title: &str) {
    let heading = escape_html(&title.to_uppercase());
    let title = escape_html(title);
    let _ = write!(
        out,
        "<details open><summary><h3 style='font-family: Arial, sans-serif;'>{}</h3></summary>\
         <div style='margin-top: 10px;'><p style='text-align: justify;'>{}</p>\
         <table style='border-collapse: collapse; width: 100%; margin-top: 20px; margin-bottom: 40px;'>\
         <tr><th style='{HEADER_CELL}'>Metric</th><th style='{HEADER_CELL}'>Value</th></tr>",
        heading,
        summary_sentence(m, &title),
    );

    for entry in entries(m) {
        match entry {
            Entry::Scalar(name, value) => {
                let _ = write!(
                    out,
                    "<tr><td style='font-weight: bold; {CELL}'>{}</td><td style='{CELL}'>{}</td></tr>",
                    title_case(name),
                    value
                );
            }
            Entry::Ranked(name, list) => {
                let _ = write!(
                    out,
                    "<tr><td colspan='2' style='background-color: #f2f2f2; padding: 12px 15px; \
                     font-weight: bold;'>{}</td></tr>",
                    title_case(name)
                );
                for item in list {
                    let _ = write!(
                        out,
                        "<tr><td style='padding-left: 25px; font-style: italic; color: #555; {SUB_CELL}'>{}</td>\
                         <td style='{SUB_CELL}'>{}</td></tr>",
                        escape_html(&item.value),
                        int_comma(item.count)
                    );
                }
            }
        }
    }

    out.push_str("</table></div></details>");
}

fn trend_table(out: &mut String, ctx: &ReportContext) {
    if ctx.trend.len() < 2 {
        return;
    }
    let _ = write!(
        out,
        "<h3>TREND</h3><table style='border-collapse: collapse; width: 100%; margin-bottom: 30px;'>\
         <tr><th style='{HEADER_CELL}'>Period</th><th style='{HEADER_CELL}'>Total Downloads</th>\
         <th style='{HEADER_CELL}'>Unique Users</th></tr>"
    );
    for point in &ctx.trend {
        let _ = write!(
            out,
            "<tr><td style='{CELL}'>{}</td><td style='{CELL}'>{}</td><td style='{CELL}'>{}</td></tr>",
            escape_html(&point.label),
            int_comma(point.downloads),
            int_comma(point.unique_users)
        );
    }
    out.push_str("</table>");
}

const EXPLANATION: &str = "<h2>Understanding the Metrics:</h2>\
<div style='text-align: justify;'>\
<p><strong>Sections</strong> are the top-level folders of the bucket. The overall table covers every section.</p>\
<ul>\
<li><strong>Total Overall Interactions Count:</strong> every request other than uploads and deletes, including downloads and metadata queries.</li>\
<li><strong>Total Files Downloads Count:</strong> number of GET requests, i.e. actual downloads.</li>\
<li><strong>Total Unique Files Downloaded:</strong> distinct files among those downloads.</li>\
<li><strong>Total Dataset Uploaded Count:</strong> distinct files created or updated (PUT/POST) during the period.</li>\
<li><strong>Total Dataset Downloaded Size:</strong> bytes sent to users for downloads.</li>\
<li><strong>Total Dataset Uploaded Size:</strong> size of the uploaded or updated objects.</li>\
<li><strong>Unique Users:</strong> distinct client IP addresses. Requests relayed through a server appear as a single user.</li>\
<li><strong>Unique Users by Download:</strong> distinct client IP addresses that downloaded at least one file.</li>\
<li><strong>Popular Files by Download:</strong> the most downloaded files.</li>\
<li><strong>Top Referrers:</strong> host of the referring page when the request carried one. Many clients send none, so treat this as indicative only.</li>\
</ul></div>";

/// Render the HTML email body.
pub fn render_html(report: &UsageReport, ctx: &ReportContext) -> String {
    let mut out = String::with_capacity(16 * 1024);
    let service = escape_html(&ctx.service_name);
    let (first, last) = report.timeframe;

    let _ = write!(
        out,
        "<html><head></head><body><p>Dear Colleague,</p>\
         <p>Please find the {service} usage report for the period spanning from \
         <strong>{}</strong> to <strong>{}</strong>. It begins with an overall summary, \
         followed by a breakdown by section.</p>",
        first.format("%B %d, %Y"),
        last.format("%B %d, %Y"),
    );

    trend_table(&mut out, ctx);
    metrics_table(&mut out, &report.overall, &ctx.service_name);
    for (section, metrics) in &report.sections {
        metrics_table(&mut out, metrics, &format!("section: {}", section));
    }
    out.push_str(EXPLANATION);

    let _ = write!(
        out,
        "<hr style='border: 1px solid #ccc; margin-top: 20px;'>\
         <p style='font-size: 0.8em; color: #666;'>This email ({}) is auto-generated and might \
         contain confidential data.",
        escape_html(&ctx.artifact_name)
    );
    if let Some(link) = &ctx.csv_link {
        let _ = write!(
            out,
            " You can download the complete CSV logs for your own analysis from \
             <a href='{}' style='color: #666;'>here</a>; this link expires in 1 week.",
            escape_html(link)
        );
    }
    out.push_str(" If you have any other queries, please reply to this email.</p></body></html>");

    out
}

/// Render the plain-text alternative of the report.
pub fn render_text(report: &UsageReport, ctx: &ReportContext) -> String {
    let mut out = String::new();
    let (first, last) = report.timeframe;

    let _ = writeln!(
        out,
        "{} usage report: {} to {}\n",
        ctx.service_name,
        first.format("%B %d, %Y"),
        last.format("%B %d, %Y")
    );

    if ctx.trend.len() >= 2 {
        let _ = writeln!(out, "TREND");
        for point in &ctx.trend {
            let _ = writeln!(
                out,
                "  {}: {} downloads, {} unique users",
                point.label,
                int_comma(point.downloads),
                int_comma(point.unique_users)
            );
        }
        out.push('\n');
    }

    let sections = std::iter::once((ctx.service_name.clone(), &report.overall)).chain(
        report
            .sections
            .iter()
            .map(|(name, m)| (format!("section: {}", name), m)),
    );
    for (title, m) in sections {
        let _ = writeln!(out, "{}", title.to_uppercase());
        let _ = writeln!(out, "{}", summary_sentence(m, &title));
        for entry in entries(m) {
            match entry {
                Entry::Scalar(name, value) => {
                    let _ = writeln!(out, "  {}: {}", title_case(name), value);
                }
                Entry::Ranked(name, list) => {
                    let _ = writeln!(out, "  {}:", title_case(name));
                    for item in list {
                        let _ = writeln!(out, "    {} ({})", item.value, int_comma(item.count));
                    }
                }
            }
        }
        out.push('\n');
    }

    if let Some(link) = &ctx.csv_link {
        let _ = writeln!(out, "Complete CSV logs (link expires in 1 week): {}", link);
    }
    let _ = writeln!(out, "Report: {}", ctx.artifact_name);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_range::DateRange;
    use crate::report::TrendPoint;
    use chrono::NaiveDate;

    fn report() -> UsageReport {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        )
        .unwrap();
        let overall = PeriodMetrics {
            total_files_downloads_count: 1234,
            total_dataset_downloaded_size: 3_000_000,
            popular_files_by_download: vec![RankedCount {
                value: "TM/<p1>/a.zip".to_string(),
                count: 7,
            }],
            ..PeriodMetrics::default()
        };
        let tm = PeriodMetrics {
            popular_projects_by_download: vec![RankedCount {
                value: "p1".to_string(),
                count: 7,
            }],
            ..PeriodMetrics::default()
        };
        UsageReport {
            range,
            timeframe: (range.start(), range.end()),
            overall,
            sections: vec![("TM".to_string(), tm)],
        }
    }

    fn context(link: Option<&str>) -> ReportContext {
        ReportContext {
            service_name: "Raw Data API".to_string(),
            artifact_name: "2024_02_01-2024_02_29".to_string(),
            csv_link: link.map(str::to_string),
            trend: vec![
                TrendPoint {
                    label: "2024_01_01-2024_01_31".to_string(),
                    downloads: 1000,
                    unique_users: 10,
                },
                TrendPoint {
                    label: "2024_02_01-2024_02_29".to_string(),
                    downloads: 1234,
                    unique_users: 12,
                },
            ],
        }
    }

    #[test]
    fn html_contains_tables_trend_and_link() {
        let html = render_html(&report(), &context(Some("https://example.org/x?a=1&b=2")));
        assert!(html.contains("February 01, 2024"));
        assert!(html.contains("RAW DATA API"));
        assert!(html.contains("SECTION: TM"));
        assert!(html.contains("Total Files Downloads Count"));
        assert!(html.contains("1,234"));
        assert!(html.contains("3.0 MB"));
        assert!(html.contains("TM/&lt;p1&gt;/a.zip"));
        assert!(html.contains("Popular Projects By Download"));
        assert!(html.contains("<h3>TREND</h3>"));
        assert!(html.contains("https://example.org/x?a=1&amp;b=2"));
        assert!(html.contains("2024_02_01-2024_02_29"));
    }

    #[test]
    fn html_without_link_or_history() {
        let mut ctx = context(None);
        ctx.trend.truncate(1);
        let html = render_html(&report(), &ctx);
        assert!(!html.contains("<a href"));
        assert!(!html.contains("TREND"));
    }

    #[test]
    fn text_part_mirrors_html() {
        let text = render_text(&report(), &context(Some("https://example.org/x")));
        assert!(text.starts_with("Raw Data API usage report"));
        assert!(text.contains("2024_01_01-2024_01_31: 1,000 downloads, 10 unique users"));
        assert!(text.contains("TM/<p1>/a.zip (7)"));
        assert!(text.contains("SECTION: TM"));
        assert!(text.contains("https://example.org/x"));
        assert!(!text.contains("<td"));
    }
}
