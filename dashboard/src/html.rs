//! Standalone page that hands a chart to vega-embed.

use crate::chart::ChartSpec;
use askama::Template;
use repcount_core::CoreError;

const VEGA_SCRIPTS: [&str; 3] = [
    "https://cdn.jsdelivr.net/npm/vega@5",
    "https://cdn.jsdelivr.net/npm/vega-lite@5",
    "https://cdn.jsdelivr.net/npm/vega-embed@6",
];

#[derive(Template)]
#[template(path = "report.html")]
struct ReportPage<'a> {
    title: &'a str,
    scripts: &'a [&'a str],
    spec_json: String,
}

/// Renders `chart` into a self-contained HTML document.
pub fn render_html(chart: &ChartSpec, title: &str) -> Result<String, CoreError> {
    let page = ReportPage {
        title,
        scripts: &VEGA_SCRIPTS,
        spec_json: script_safe(&chart.to_json()?),
    };
    page.render().map_err(|e| CoreError::Internal {
        message: format!("Failed to render report page: {}", e),
    })
}

/// The spec sits inside a `<script>` element, so no string value may
/// contain `</`. JSON allows `\/` for `/`.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use repcount_core::{AttemptLabel, LongRecord};
    use serde_json::Value;

    fn extract_spec(page: &str) -> Value {
        let start = page.find("vegaEmbed(\"#chart\", ").unwrap() + "vegaEmbed(\"#chart\", ".len();
        let end = page.rfind(", { actions: false })").unwrap();
        serde_json::from_str(&page[start..end]).unwrap()
    }

    #[test]
    fn test_page_embeds_chart() {
        let records = vec![LongRecord {
            date: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            attempt_label: AttemptLabel::Third,
            value: Some(21.0),
        }];
        let chart = ChartSpec::attempts_bar(&records);
        let page = render_html(&chart, "Pushups").unwrap();

        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>Pushups</title>"));
        for src in VEGA_SCRIPTS {
            assert!(page.contains(&format!("<script src=\"{src}\"></script>")));
        }
        assert_eq!(extract_spec(&page), serde_json::to_value(&chart).unwrap());
    }

    #[test]
    fn test_title_is_escaped() {
        let chart = ChartSpec::attempts_bar(&[]).with_title("</script><b>");
        let page = render_html(&chart, "<b>@BCApushups</b>").unwrap();

        assert!(page.contains("<title>&lt;b&gt;@BCApushups&lt;"));
        assert!(page.contains("<h1>&lt;b&gt;@BCApushups&lt;"));
        assert!(!page.contains("<b>@BCApushups"));
        assert_eq!(page.matches("</script>").count(), VEGA_SCRIPTS.len() + 1);
        assert_eq!(extract_spec(&page)["title"], "</script><b>");
    }
}
