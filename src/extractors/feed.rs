// src/extractors/feed.rs
use chrono_tz::Tz;
use roxmltree::{Document, Node, ParsingOptions};

use super::datetime::parse_datetime;
use crate::models::PressReleaseRecord;
use crate::utils::error::ExtractError;

const DATE_ELEMENTS: &[&str] = &["pubDate", "published", "updated", "date"];

fn node_text(node: Node) -> String {
    node.descendants()
        .filter(|d| d.is_text())
        .filter_map(|d| d.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn child_text(entry: Node, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        entry
            .children()
            .find(|c| c.is_element() && c.tag_name().name() == *name)
            .map(node_text)
            .filter(|text| !text.is_empty())
    })
}

/// RSS puts the URL in the element text, Atom in `href` of the alternate link.
fn entry_link(entry: Node) -> Option<String> {
    let links: Vec<Node> = entry
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "link")
        .collect();

    let atom = links.iter().find(|l| {
        l.attribute("href").is_some() && matches!(l.attribute("rel"), None | Some("alternate"))
    });
    if let Some(link) = atom {
        return link.attribute("href").map(str::to_string);
    }
    links.into_iter().map(node_text).find(|text| !text.is_empty())
}

fn parse_entry(entry: Node, default_tz: Tz) -> Result<PressReleaseRecord, ExtractError> {
    let title = child_text(entry, &["title"])
        .ok_or_else(|| ExtractError::Parse("feed entry without title".to_string()))?;
    let url = entry_link(entry)
        .ok_or_else(|| ExtractError::Parse(format!("feed entry \"{}\" without link", title)))?;
    let published = child_text(entry, DATE_ELEMENTS)
        .ok_or_else(|| ExtractError::Parse(format!("feed entry \"{}\" without date", title)))?;

    Ok(PressReleaseRecord {
        timestamp: parse_datetime(&published, default_tz)?,
        title,
        url,
    })
}

/// Parses an RSS or Atom feed into press release candidates. Entries that
/// lack a title, link or date are logged and skipped.
pub fn parse_feed(text: &str, default_tz: Tz) -> Result<Vec<PressReleaseRecord>, ExtractError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(text, options)
        .map_err(|e| ExtractError::Parse(format!("Invalid feed XML: {}", e)))?;

    let mut press_releases = Vec::new();
    let entries = document
        .descendants()
        .filter(|n| n.is_element() && matches!(n.tag_name().name(), "item" | "entry"));
    for entry in entries {
        match parse_entry(entry, default_tz) {
            Ok(press_release) => {
                tracing::info!("Found press release {}", press_release.title);
                press_releases.push(press_release);
            }
            Err(e) => tracing::error!("Skipping feed entry: {}", e),
        }
    }
    Ok(press_releases)
}
