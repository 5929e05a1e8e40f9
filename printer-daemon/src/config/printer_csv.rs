//! Printer selection from `printer.csv`.
//!
//! ```text
//! Activate,Bluetooth ID,printer model
//! 1,1C:B8:57:50:01:D9,WISP-i350
//! ```
//!
//! The header is located case-insensitively anywhere in the file. The first
//! row whose activate column is `1` or `true` and whose address is a valid
//! MAC wins. The file is re-read on every lookup.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use printer_link::{PrinterTarget, PrinterTargetSource};

use super::validation::is_valid_mac;

const COL_ACTIVATE: &str = "activate";
const COL_ADDRESS: &str = "bluetooth id";
const COL_MODEL: &str = "printer model";

/// [`PrinterTargetSource`] backed by a CSV file.
#[derive(Debug, Clone)]
pub struct PrinterCsv {
    path: PathBuf,
}

impl PrinterCsv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PrinterTargetSource for PrinterCsv {
    async fn active_printer(&self) -> Option<PrinterTarget> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Cannot read printer list: {e}");
                return None;
            }
        };
        let target = parse_printer_csv(&contents);
        if target.is_none() {
            tracing::warn!(path = %self.path.display(), "No active printer in list");
        }
        target
    }
}

struct Columns {
    activate: usize,
    address: usize,
    model: Option<usize>,
}

impl Columns {
    fn from_header(fields: &[String]) -> Option<Self> {
        let find = |name: &str| fields.iter().position(|f| f.eq_ignore_ascii_case(name));
        Some(Self {
            activate: find(COL_ACTIVATE)?,
            address: find(COL_ADDRESS)?,
            model: find(COL_MODEL),
        })
    }
}

/// Pick the active printer out of CSV text.
pub fn parse_printer_csv(contents: &str) -> Option<PrinterTarget> {
    let mut lines = contents.lines().map(split_row);
    let columns = lines.by_ref().find_map(|fields| Columns::from_header(&fields))?;

    lines.find_map(|fields| {
        let activate = fields.get(columns.activate)?;
        if activate != "1" && !activate.eq_ignore_ascii_case("true") {
            return None;
        }
        let address = fields.get(columns.address)?;
        if !is_valid_mac(address) {
            tracing::debug!(address = %address, "Skipping row with invalid address");
            return None;
        }
        let display_model = columns
            .model
            .and_then(|i| fields.get(i))
            .filter(|m| !m.is_empty())
            .cloned();
        Some(PrinterTarget {
            mac_address: address.clone(),
            display_model,
        })
    })
}

fn split_row(line: &str) -> Vec<String> {
    line.split(',')
        .map(|f| f.trim().trim_matches('"').trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_active_row_wins() {
        let csv = "Activate,Bluetooth ID,printer model\n\
                   0,00:11:22:33:44:55,WSP-R240\n\
                   1,1C:B8:57:50:01:D9,WISP-i350\n\
                   1,AA:BB:CC:DD:EE:FF,WSP-i450\n";
        assert_eq!(
            parse_printer_csv(csv),
            Some(PrinterTarget {
                mac_address: "1C:B8:57:50:01:D9".into(),
                display_model: Some("WISP-i350".into()),
            })
        );
    }

    #[test]
    fn header_is_case_insensitive_and_may_follow_preamble() {
        let csv = "# exported list\n\
                   \n\
                   \"BLUETOOTH ID\",ACTIVATE\n\
                   \"1c-b8-57-50-01-d9\",True\n";
        let target = parse_printer_csv(csv).unwrap();
        assert_eq!(target.mac_address, "1c-b8-57-50-01-d9");
        assert_eq!(target.display_model, None);
    }

    #[test]
    fn no_active_row_is_absent() {
        let csv = "Activate,Bluetooth ID,printer model\n0,1C:B8:57:50:01:D9,WISP-i350\n";
        assert_eq!(parse_printer_csv(csv), None);
    }

    #[test]
    fn invalid_address_rows_are_skipped() {
        let csv = "Activate,Bluetooth ID\n1,not-a-mac\n1,1C:B8:57:50:01\n1,AA:BB:CC:DD:EE:FF\n";
        assert_eq!(
            parse_printer_csv(csv).map(|t| t.mac_address),
            Some("AA:BB:CC:DD:EE:FF".into())
        );
    }

    #[test]
    fn missing_header_or_short_rows() {
        assert_eq!(parse_printer_csv("1,1C:B8:57:50:01:D9\n"), None);
        assert_eq!(parse_printer_csv(""), None);
        assert_eq!(parse_printer_csv("Activate,Bluetooth ID\n1\n"), None);
    }

    #[tokio::test]
    async fn file_is_reread_on_every_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printer.csv");
        let source = PrinterCsv::new(&path);
        assert_eq!(source.path(), path);

        assert_eq!(source.active_printer().await, None);

        std::fs::write(&path, "Activate,Bluetooth ID,printer model\n1,1C:B8:57:50:01:D9,WISP-i350\n")
            .unwrap();
        assert_eq!(
            source.active_printer().await.map(|t| t.mac_address),
            Some("1C:B8:57:50:01:D9".into())
        );

        std::fs::write(&path, "Activate,Bluetooth ID\n1,AA:BB:CC:DD:EE:FF\n").unwrap();
        assert_eq!(
            source.active_printer().await.map(|t| t.mac_address),
            Some("AA:BB:CC:DD:EE:FF".into())
        );
    }
}
