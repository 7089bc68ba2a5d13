//! Server-side HTML for the search page and result fragments.

use std::fmt::Write;

use crate::data::facets::FacetSet;
use crate::data::filter::SearchResult;
use crate::data::model::FacetField;
use crate::state::{Readiness, Snapshot};

const NO_MATCHES: &str = "No colleges found matching your criteria.";

const SORT_CHOICES: [(&str, &str); 5] = [
    ("rank", "Rank"),
    ("percentile", "Percentile"),
    ("college_name", "College"),
    ("branch_name", "Branch"),
    ("category", "Category"),
];

/// Escape text for element content and quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn label(field: FacetField) -> &'static str {
    match field {
        FacetField::Category => "Category",
        FacetField::QuotaType => "Quota",
        FacetField::BranchName => "Branch",
        FacetField::CollegeName => "College",
        FacetField::City => "City",
    }
}

// ---------------------------------------------------------------------------
// Full page
// ---------------------------------------------------------------------------

/// The search page, with one dropdown per facet.
pub fn search_page(snapshot: &Snapshot, default_radius: i64) -> String {
    let mut html = String::new();
    html.push_str(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>College Cutoff Finder</title>\n</head>\n<body>\n<main>\n\
         <h1>College Cutoff Finder</h1>\n",
    );

    if let Readiness::Degraded { reason } = &snapshot.readiness {
        let _ = writeln!(
            html,
            "<div class=\"alert degraded\" role=\"alert\">Cutoff data is unavailable: {}</div>",
            escape(reason)
        );
    }

    html.push_str("<form id=\"search-form\">\n");
    let _ = writeln!(
        html,
        "<label>Rank <input type=\"number\" name=\"rank\" min=\"1\" required></label>\n\
         <label>Rank window ± <input type=\"number\" name=\"radius\" min=\"0\" value=\"{default_radius}\"></label>"
    );
    write_facet_selects(&mut html, &snapshot.dataset.facets);

    html.push_str("<label>Sort by <select name=\"sort_by\">");
    for (value, text) in SORT_CHOICES {
        let _ = write!(html, "<option value=\"{value}\">{text}</option>");
    }
    html.push_str(
        "</select></label>\n<label>Order <select name=\"order\">\
         <option value=\"asc\">Ascending</option><option value=\"desc\">Descending</option>\
         </select></label>\n\
         <button type=\"submit\">Search</button>\n\
         <button type=\"button\" id=\"export\">Export CSV</button>\n</form>\n\
         <section id=\"search-results-container\"></section>\n</main>\n",
    );
    html.push_str(SCRIPT);
    html.push_str("</body>\n</html>\n");
    html
}

fn write_facet_selects(html: &mut String, facets: &FacetSet) {
    for field in FacetField::ALL {
        let _ = write!(
            html,
            "<label>{} <select name=\"{}\">",
            label(field),
            field.param()
        );
        for value in facets.get(field) {
            let value = escape(value);
            let _ = write!(html, "<option value=\"{value}\">{value}</option>");
        }
        html.push_str("</select></label>\n");
    }
}

const SCRIPT: &str = r#"<script>
const form = document.getElementById('search-form');
const results = document.getElementById('search-results-container');
form.addEventListener('submit', async (event) => {
  event.preventDefault();
  const response = await fetch('/search', { method: 'POST', body: new URLSearchParams(new FormData(form)) });
  results.innerHTML = await response.text();
});
document.getElementById('export').addEventListener('click', async () => {
  const response = await fetch('/export', { method: 'POST', body: new URLSearchParams(new FormData(form)) });
  if (!response.ok) { results.innerHTML = await response.text(); return; }
  const url = URL.createObjectURL(await response.blob());
  const link = document.createElement('a');
  link.href = url;
  link.download = 'college_results.csv';
  link.click();
  URL.revokeObjectURL(url);
});
</script>
"#;

// ---------------------------------------------------------------------------
// Fragments
// ---------------------------------------------------------------------------

/// Summary line plus result table, injected into the page.
pub fn results_fragment(result: &SearchResult) -> String {
    let stats = &result.stats;
    if stats.total_matches == 0 {
        return format!("<p class=\"empty\">{NO_MATCHES}</p>\n");
    }

    let mut html = String::new();
    let _ = writeln!(
        html,
        "<p class=\"summary\">{} matches across {} colleges and {} branches, ranks {} to {}</p>",
        stats.total_matches,
        stats.unique_colleges,
        stats.unique_branches,
        stats.rank_min,
        stats.rank_max
    );
    if let Some(page) = result.page {
        let _ = writeln!(
            html,
            "<p class=\"pager\">Page {} of {}</p>",
            page.page, page.total_pages
        );
    }

    html.push_str(
        "<table>\n<thead><tr><th>College</th><th>Branch</th><th>Category</th>\
         <th>Quota</th><th>Rank</th><th>Percentile</th><th>City</th></tr></thead>\n<tbody>\n",
    );
    for rec in &result.records {
        let percentile = rec.percentile.map(|p| format!("{p:.2}")).unwrap_or_default();
        let _ = writeln!(
            html,
            "<tr><td>{} ({})</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&rec.college_name),
            escape(&rec.college_code),
            escape(&rec.branch_name),
            escape(&rec.category),
            escape(&rec.quota_type),
            rec.rank,
            percentile,
            escape(rec.city.as_deref().unwrap_or("")),
        );
    }
    html.push_str("</tbody>\n</table>\n");
    html
}

/// Inline error shown in place of results.
pub fn error_fragment(message: &str) -> String {
    format!(
        "<div class=\"alert error\" role=\"alert\">{}</div>\n",
        escape(message)
    )
}

/// Message attached to JSON responses with no rows.
pub fn no_matches_message() -> &'static str {
    NO_MATCHES
}
