// src/utils/html_debug.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::extractors::{Field, FieldChains};
use crate::web::safe_filename;

fn css_class(field: Field) -> String {
    format!("highlight-{}", field)
}

/// Wraps each `(start, end, field)` byte range of `html` in a highlighted span.
/// Ranges overlapping an earlier one are dropped.
pub fn annotate_html(html: &str, highlights: &[(usize, usize, Field)]) -> String {
    let mut debug_html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<style>\n");
    debug_html.push_str(".highlight-cases { background-color: #FFFF00; }\n");
    debug_html.push_str(".highlight-recovered { background-color: #90EE90; }\n");
    debug_html.push_str(".highlight-deaths { background-color: #FFA500; }\n");
    debug_html.push_str(".highlight-hospitalized { background-color: #ADD8E6; }\n");
    debug_html.push_str(".highlight-icu { background-color: #FFC0CB; }\n");
    debug_html.push_str("</style>\n</head>\n<body>\n");

    let mut sorted_highlights = highlights.to_vec();
    sorted_highlights.sort_by_key(|h| h.0);

    let mut last_pos = 0;
    for (start, end, field) in sorted_highlights {
        if start < last_pos || end > html.len() {
            continue;
        }
        debug_html.push_str(&html[last_pos..start]);
        debug_html.push_str(&format!(
            "<span class=\"{}\" title=\"Position: {}-{}, Field: {}\">",
            css_class(field),
            start,
            end,
            field
        ));
        debug_html.push_str(&html[start..end]);
        debug_html.push_str("</span>");
        last_pos = end;
    }
    debug_html.push_str(&html[last_pos..]);

    debug_html.push_str("\n</body>\n</html>");
    debug_html
}

/// Every match of every configured field pattern.
pub fn field_highlights(html: &str, fields: &FieldChains) -> Vec<(usize, usize, Field)> {
    fields
        .iter()
        .flat_map(|chain| {
            chain
                .patterns()
                .flat_map(move |regex| regex.find_iter(html).map(move |m| (m.start(), m.end(), chain.field)))
        })
        .filter(|(start, end, _)| start < end)
        .collect()
}

/// Writes the annotated page to `<dir>/<safe filename of url>.html`.
pub fn save_debug_html(dir: &Path, url: &str, html: &str, fields: &FieldChains) -> Result<PathBuf, std::io::Error> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.html", safe_filename(url)));
    let highlights = field_highlights(html, fields);
    fs::write(&path, annotate_html(html, &highlights))?;
    tracing::info!("Saved debug HTML to {}", path.display());
    Ok(path)
}
