use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::OnceLock;

use crate::error::{Error, Result};

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("Invalid selector {}: {:?}", css, e)))
}

pub fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Trimmed text of every `td` in a row, header cells excluded.
pub fn td_texts(row: &ElementRef) -> Result<Vec<String>> {
    let cell_selector = selector("td")?;
    Ok(row.select(&cell_selector).map(|cell| element_text(&cell)).collect())
}

fn row_has_label(row: &ElementRef, cell_selector: &Selector, label: &str) -> bool {
    row.select(cell_selector)
        .any(|cell| element_text(&cell).eq_ignore_ascii_case(label))
}

/// First row of `table` with a cell reading `label`, ignoring case.
pub fn find_labeled_row<'a>(table: &ElementRef<'a>, label: &str) -> Result<Option<ElementRef<'a>>> {
    let row_selector = selector("tr")?;
    let cell_selector = selector("th, td")?;
    Ok(table
        .select(&row_selector)
        .find(|row| row_has_label(row, &cell_selector, label)))
}

/// Reads the number at `index`. Blank, missing and non-numeric cells are
/// computation errors, never NaN.
pub fn parse_stat(cells: &[String], index: usize, name: &str) -> Result<f64> {
    let raw = cells
        .get(index)
        .ok_or_else(|| Error::Computation(format!("No {} cell at column {}", name, index)))?;
    let cleaned = raw.replace(',', "");
    let value = cleaned
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Computation(format!("Non-numeric {} value: {:?}", name, raw)))?;
    if !value.is_finite() {
        return Err(Error::Computation(format!("Non-finite {} value: {:?}", name, raw)));
    }
    Ok(value)
}

pub fn parse_score(text: &str) -> Option<i32> {
    text.trim().parse::<i32>().ok()
}

fn school_href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/schools/([^/]+)/").expect("static regex"))
}

/// `/cbb/schools/duke/men/2024.html` -> `duke`
pub fn team_slug_from_href(href: &str) -> Option<String> {
    school_href_regex()
        .captures(href)
        .map(|cap| cap[1].to_string())
}

/// The site ships secondary tables inside HTML comments; expose them to the parser.
pub fn uncomment_tables(html: &str) -> String {
    html.replace("<!--", "").replace("-->", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_stat() {
        let row = cells(&["200", ".538", "1,024", "", "abc"]);
        assert_eq!(parse_stat(&row, 0, "MP").unwrap(), 200.0);
        assert!((parse_stat(&row, 1, "eFG%").unwrap() - 0.538).abs() < 1e-12);
        assert_eq!(parse_stat(&row, 2, "MP").unwrap(), 1024.0);
        assert!(matches!(parse_stat(&row, 3, "ORtg"), Err(Error::Computation(_))));
        assert!(matches!(parse_stat(&row, 4, "FGA"), Err(Error::Computation(_))));
        assert!(matches!(parse_stat(&row, 9, "PTS"), Err(Error::Computation(_))));
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score(" 78 "), Some(78));
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("Final"), None);
    }

    #[test]
    fn test_team_slug_from_href() {
        assert_eq!(
            team_slug_from_href("/cbb/schools/north-carolina/men/2024.html"),
            Some("north-carolina".to_string())
        );
        assert_eq!(team_slug_from_href("/cbb/boxscores/2024-01-09.html"), None);
    }

    #[test]
    fn test_find_labeled_row() {
        let html = scraper::Html::parse_fragment(
            "<table id=\"t\"><tr><th>Player</th><td>1</td></tr><tr><th>school totals</th><td>2</td></tr></table>",
        );
        let table = html.select(&selector("table").unwrap()).next().unwrap();
        let row = find_labeled_row(&table, "School Totals").unwrap().unwrap();
        assert_eq!(td_texts(&row).unwrap(), vec!["2".to_string()]);
        assert!(find_labeled_row(&table, "Opponent").unwrap().is_none());
    }

    #[test]
    fn test_uncomment_tables() {
        assert_eq!(uncomment_tables("<div><!-- <table></table> --></div>"), "<div> <table></table> </div>");
    }
}
