// src/extractors/archive.rs
use chrono_tz::Tz;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::datetime::parse_datetime;
use super::locator::element_text;
use crate::models::PressReleaseRecord;
use crate::utils::error::ExtractError;

/// Where the listing keeps its teaser rows.
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    pub container: Selector,
    pub row: Selector,
    pub link: Selector,
    pub date: Selector,
}

fn parse_row(row: ElementRef, page_url: &Url, layout: &ArchiveLayout, default_tz: Tz) -> Result<PressReleaseRecord, ExtractError> {
    let link = row
        .select(&layout.link)
        .next()
        .ok_or_else(|| ExtractError::Parse("archive row without link".to_string()))?;
    let title = element_text(link);
    let href = link
        .value()
        .attr("href")
        .ok_or_else(|| ExtractError::Parse(format!("archive link \"{}\" without href", title)))?;
    let url = page_url
        .join(href)
        .map_err(|e| ExtractError::Parse(format!("Invalid archive link \"{}\": {}", href, e)))?;
    let date_text = row
        .select(&layout.date)
        .next()
        .map(element_text)
        .ok_or_else(|| ExtractError::Parse(format!("archive row \"{}\" without date", title)))?;

    Ok(PressReleaseRecord {
        timestamp: parse_datetime(&date_text, default_tz)?,
        title,
        url: url.to_string(),
    })
}

/// Parses one archive listing page. Links are resolved against the page's
/// own URL, so root-relative hrefs land on the page's origin.
pub fn parse_archive(
    html: &str,
    page_url: &Url,
    layout: &ArchiveLayout,
    default_tz: Tz,
) -> Result<Vec<PressReleaseRecord>, ExtractError> {
    let document = Html::parse_document(html);
    let container = document
        .select(&layout.container)
        .next()
        .ok_or_else(|| ExtractError::Parse(format!("Archive container not found in {}", page_url)))?;

    let mut press_releases = Vec::new();
    for row in container.select(&layout.row) {
        match parse_row(row, page_url, layout, default_tz) {
            Ok(press_release) => {
                tracing::info!("Found archive press release {}", press_release.title);
                press_releases.push(press_release);
            }
            Err(e) => tracing::error!("Skipping archive row on {}: {}", page_url, e),
        }
    }
    Ok(press_releases)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ArchiveLayout {
        ArchiveLayout {
            container: Selector::parse(".modul-autoteaser").unwrap(),
            row: Selector::parse(".row-fluid").unwrap(),
            link: Selector::parse(".text a").unwrap(),
            date: Selector::parse(".date").unwrap(),
        }
    }

    const ARCHIVE: &str = r#"<html><body>
      <div class="modul-autoteaser">
        <div class="row-fluid">
          <div class="span2 date">20.03.2020</div>
          <div class="span10 text"><a href="/sen/gpg/service/presse/2020/pressemitteilung.909000.php">Coronavirus: Derzeitiger Stand</a></div>
        </div>
        <div class="row-fluid">
          <div class="span2 date">19.03.2020 15:30</div>
          <div class="span10 text"><a href="https://www.berlin.de/other/pm.1.php">Absolute link</a></div>
        </div>
        <div class="row-fluid"><div class="text">no link here</div></div>
      </div></body></html>"#;

    #[test]
    fn test_parse_archive_rows() {
        let page = Url::parse("https://www.berlin.de/sen/gpg/service/presse/2020/?page_at_1_0=5").unwrap();
        let records = parse_archive(ARCHIVE, &page, &layout(), chrono_tz::Europe::Berlin).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Coronavirus: Derzeitiger Stand");
        assert_eq!(
            records[0].url,
            "https://www.berlin.de/sen/gpg/service/presse/2020/pressemitteilung.909000.php"
        );
        assert_eq!(records[0].timestamp.to_rfc3339(), "2020-03-20T00:00:00+01:00");
        assert_eq!(records[1].url, "https://www.berlin.de/other/pm.1.php");
    }

    #[test]
    fn test_missing_container() {
        let page = Url::parse("https://www.berlin.de/").unwrap();
        let err = parse_archive("<p>leer</p>", &page, &layout(), chrono_tz::Europe::Berlin).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
