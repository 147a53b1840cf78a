// src/models/documents.rs
use super::records::ReportTimestamp;

/// A fetched snapshot of the statistics dashboard page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub timestamp: ReportTimestamp,
    pub content: String,
}

impl DashboardSnapshot {
    /// Returns the content with UTF-8 that was mis-decoded as Latin-1 repaired.
    ///
    /// Older snapshots were stored after the server omitted the charset, so
    /// "Stationäre" ended up as "StationÃ¤re". Text that is not such a
    /// round-trip is returned unchanged.
    pub fn content_utf8(&self) -> String {
        let mut bytes = Vec::with_capacity(self.content.len());
        for ch in self.content.chars() {
            let code = ch as u32;
            if code > 0xFF {
                return self.content.clone();
            }
            bytes.push(code as u8);
        }
        String::from_utf8(bytes).unwrap_or_else(|_| self.content.clone())
    }
}

/// A fetched district CSV export, timestamped by its Last-Modified header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistrictTable {
    pub timestamp: ReportTimestamp,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn snapshot(content: &str) -> DashboardSnapshot {
        DashboardSnapshot {
            timestamp: DateTime::parse_from_rfc3339("2020-10-07T00:00:00+02:00").unwrap(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_content_utf8_repairs_latin1_mojibake() {
        assert_eq!(snapshot("StationÃ¤re Behandlung").content_utf8(), "Stationäre Behandlung");
    }

    #[test]
    fn test_content_utf8_already_converted() {
        assert_eq!(snapshot("Stationäre Behandlung").content_utf8(), "Stationäre Behandlung");
        assert_eq!(snapshot("Intensivstation – ITS").content_utf8(), "Intensivstation – ITS");
    }
}
