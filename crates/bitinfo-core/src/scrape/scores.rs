//! Score listing and per-course analytics pages from the legacy academic system.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use super::cell_text;
use crate::api::ApiError;
use crate::models::{ScoreDetail, ScoreRow};

/// Header rows at the top of the listing table
const HEADER_ROWS: usize = 2;

// Listing column positions
const COL_TERM: usize = 1;
const COL_COURSE_ID: usize = 2;
const COL_NAME: usize = 3;
const COL_CREDIT: usize = 6;
const COL_TYPE: usize = 11;
const LISTING_COLUMNS: usize = 12;

// Detail cell positions
const CELL_CLASS_TOTAL: usize = 1;
const CELL_MAJORITY_TOTAL: usize = 2;
const CELL_AVERAGE: usize = 4;
const CELL_MAX: usize = 5;
const CELL_CLASS_RANK: usize = 8;
const CELL_MAJORITY_RANK: usize = 9;
const CELL_ALL_RANK: usize = 10;

/// Detail values are rendered as "label：value" with a full-width colon
const LABEL_SEPARATOR: char = '：';

/// The total score only appears inside the detail link's click handler
static SCORE_PARAM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"zcj=(\d+(?:\.\d+)?)").expect("Invalid score regex"));

static FIRST_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Invalid number regex"));

/// Parse the score listing table. A page without the listing table, or whose
/// leading rows are not header rows, is malformed; a table with only its
/// headers means no scores yet.
pub fn parse_score_list(html: &str) -> Result<Vec<ScoreRow>, ApiError> {
    let doc = Html::parse_document(html);
    let table = doc.select(selector!("table#dataList")).next().ok_or_else(|| {
        warn!(body = %ApiError::truncate_body(html), "Score listing table not found");
        ApiError::malformed("score list", "listing table #dataList not found")
    })?;
    let rows: Vec<ElementRef> = table.select(selector!("tr")).collect();

    if rows.len() < HEADER_ROWS {
        warn!(rows = rows.len(), "Score listing table without header rows");
        return Err(ApiError::malformed(
            "score list",
            format!("expected at least {} header rows, found {}", HEADER_ROWS, rows.len()),
        ));
    }
    for (index, header) in rows.iter().take(HEADER_ROWS).enumerate() {
        let is_header = header.select(selector!("th")).next().is_some()
            && header.select(selector!("td")).next().is_none();
        if !is_header {
            warn!(row = index, "Score listing header row has an unexpected shape");
            return Err(ApiError::malformed(
                "score list",
                format!("row {} is not a header row", index),
            ));
        }
    }

    let mut scores = Vec::new();
    for (index, row) in rows.iter().enumerate().skip(HEADER_ROWS) {
        let cells: Vec<ElementRef> = row.select(selector!("td")).collect();

        // "No records" placeholder spans the whole table
        if cells.len() <= 1 {
            debug!(row = index, "Skipping placeholder row");
            continue;
        }
        if cells.len() < LISTING_COLUMNS {
            return Err(ApiError::malformed(
                "score list",
                format!("row {} has {} cells, expected {}", index, cells.len(), LISTING_COLUMNS),
            ));
        }

        let credit_text = cell_text(&cells[COL_CREDIT]);
        let credit = credit_text.parse::<f64>().map_err(|_| {
            ApiError::malformed("score list", format!("row {} credit {:?}", index, credit_text))
        })?;

        scores.push(ScoreRow {
            course_id: cell_text(&cells[COL_COURSE_ID]),
            term: cell_text(&cells[COL_TERM]),
            name: cell_text(&cells[COL_NAME]),
            course_type: cell_text(&cells[COL_TYPE]),
            credit,
            score: score_from_handler(&cells[cells.len() - 1]).ok_or_else(|| {
                ApiError::malformed("score list", format!("row {} has no score parameter", index))
            })?,
        });
    }

    Ok(scores)
}

fn score_from_handler(cell: &ElementRef) -> Option<f64> {
    let link = cell.select(selector!("a")).next()?;
    let onclick = link.value().attr("onclick")?;
    SCORE_PARAM_REGEX
        .captures(onclick)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse the per-course analytics page.
pub fn parse_score_detail(html: &str) -> Result<ScoreDetail, ApiError> {
    let doc = Html::parse_document(html);
    let cells: Vec<String> = doc.select(selector!("td")).map(|c| cell_text(&c)).collect();

    if cells.len() <= CELL_ALL_RANK {
        warn!(cells = cells.len(), "Score detail table too short");
        return Err(ApiError::malformed(
            "score detail",
            format!("expected at least {} cells, found {}", CELL_ALL_RANK + 1, cells.len()),
        ));
    }

    Ok(ScoreDetail {
        class_total: first_number(&cells[CELL_CLASS_TOTAL], "class total")?,
        majority_total: first_number(&cells[CELL_MAJORITY_TOTAL], "majority total")?,
        average: labeled_number(&cells[CELL_AVERAGE], "average")?,
        max: labeled_number(&cells[CELL_MAX], "max")?,
        class_rank: labeled_percent(&cells[CELL_CLASS_RANK], "class rank")?,
        majority_rank: labeled_percent(&cells[CELL_MAJORITY_RANK], "majority rank")?,
        all_rank: labeled_percent(&cells[CELL_ALL_RANK], "all rank")?,
    })
}

fn first_number(text: &str, field: &str) -> Result<u32, ApiError> {
    FIRST_NUMBER_REGEX
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ApiError::malformed("score detail", format!("{}: {:?}", field, text)))
}

fn labeled_value<'a>(text: &'a str, field: &str) -> Result<&'a str, ApiError> {
    text.split_once(LABEL_SEPARATOR)
        .map(|(_, value)| value.trim())
        .ok_or_else(|| ApiError::malformed("score detail", format!("{}: {:?}", field, text)))
}

fn labeled_number(text: &str, field: &str) -> Result<f64, ApiError> {
    let value = labeled_value(text, field)?;
    value
        .parse()
        .map_err(|_| ApiError::malformed("score detail", format!("{}: {:?}", field, value)))
}

/// "班级排名：12%" becomes 0.12
fn labeled_percent(text: &str, field: &str) -> Result<f64, ApiError> {
    let value = labeled_value(text, field)?;
    value
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .map(|p| p / 100.0)
        .map_err(|_| ApiError::malformed("score detail", format!("{}: {:?}", field, value)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn listing_row(term: &str, course_id: &str, name: &str, score: u32) -> String {
        format!(
            r#"<tr><td>1</td><td>{term}</td><td>{course_id}</td><td>{name}</td><td>{score}</td>
            <td></td><td>3.5</td><td>48</td><td>考试</td><td></td><td></td><td>必修</td>
            <td><a href="javascript:void(0)" onclick="JsMod('/jsxsd/kscj/pscj_list.do?xs0101id=1120210001&amp;zcj={score}&amp;jx0404id=1',700,500)">查看</a></td></tr>"#
        )
    }

    pub(crate) fn listing_page(rows: &[String]) -> String {
        format!(
            r#"<html><body><table id="dataList">
            <tr><th colspan="13">成绩列表</th></tr>
            <tr><th>序号</th><th>开课学期</th><th>课程编号</th><th>课程名称</th></tr>
            {}
            </table></body></html>"#,
            rows.join("\n")
        )
    }

    pub(crate) fn detail_page() -> String {
        r#"<html><body><table>
        <tr><td>成绩分析</td><td>班级人数：32人</td><td>专业人数：128人</td></tr>
        <tr><td>统计</td><td>平均分：78.6</td><td>最高分：98</td></tr>
        <tr><td>排名</td><td>-</td><td>班级排名：12%</td><td>专业排名：20%</td><td>全体排名：25%</td></tr>
        </table></body></html>"#
            .to_string()
    }

    #[test]
    fn test_parse_score_list() {
        let html = listing_page(&[
            listing_row("2021-2022-1", "CS101", "数据结构", 88),
            listing_row("2021-2022-1", "MA102", "高等数学", 95),
        ]);
        let rows = parse_score_list(&html).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].course_id, "CS101");
        assert_eq!(rows[0].term, "2021-2022-1");
        assert_eq!(rows[0].name, "数据结构");
        assert_eq!(rows[0].course_type, "必修");
        assert_eq!(rows[0].credit, 3.5);
        assert_eq!(rows[0].score, 88.0);
        assert_eq!(rows[1].score, 95.0);
    }

    #[test]
    fn test_headers_only_is_empty_not_error() {
        assert!(parse_score_list(&listing_page(&[])).unwrap().is_empty());
    }

    #[test]
    fn test_placeholder_row_skipped() {
        let html = listing_page(&["<tr><td colspan=\"13\">未查询到数据</td></tr>".to_string()]);
        assert!(parse_score_list(&html).unwrap().is_empty());
    }

    #[test]
    fn test_missing_table_is_malformed() {
        let err = parse_score_list("<html><body><form id=\"casLoginForm\"></form></body></html>")
            .unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse { what: "score list", .. }));
    }

    #[test]
    fn test_unrelated_page_is_malformed_not_empty() {
        let maintenance = "<table class=layout><tr><td>系统维护中</td></tr>\
            <tr><td>System maintenance</td></tr><tr><td>请稍后再试</td></tr></table>";
        assert!(matches!(
            parse_score_list(maintenance),
            Err(ApiError::MalformedResponse { what: "score list", .. })
        ));
    }

    #[test]
    fn test_listing_table_without_headers_is_malformed() {
        let html = r#"<table id="dataList"><tr><td>1</td></tr><tr><td>2</td></tr></table>"#;
        assert!(matches!(
            parse_score_list(html),
            Err(ApiError::MalformedResponse { what: "score list", .. })
        ));
    }

    #[test]
    fn test_missing_score_parameter_is_malformed() {
        let row = listing_row("2021-2022-1", "CS101", "数据结构", 88).replace("zcj=", "cj=");
        let err = parse_score_list(&listing_page(&[row])).unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_score_detail() {
        let detail = parse_score_detail(&detail_page()).unwrap();
        assert_eq!(detail.class_total, 32);
        assert_eq!(detail.majority_total, 128);
        assert_eq!(detail.average, 78.6);
        assert_eq!(detail.max, 98.0);
        assert!((detail.class_rank - 0.12).abs() < 1e-9);
        assert!((detail.majority_rank - 0.20).abs() < 1e-9);
        assert!((detail.all_rank - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_detail_without_separator_is_malformed() {
        let html = detail_page().replace("平均分：78.6", "平均分 78.6");
        assert!(matches!(
            parse_score_detail(&html),
            Err(ApiError::MalformedResponse { what: "score detail", .. })
        ));
    }
}
