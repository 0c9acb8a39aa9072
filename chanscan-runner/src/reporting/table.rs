//! Scan result table (`scan_results.csv`).

use std::path::Path;

use crate::outcome::SymbolHit;

pub const SCAN_TABLE: &str = "scan_results.csv";

const HEADER: [&str; 5] = ["Code", "Name", "Level", "Signal Type", "Signal Time"];

/// One row per hit, in the order given.
pub fn write_scan_table(path: &Path, hits: &[SymbolHit]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HEADER)?;
    for hit in hits {
        writer.write_record([
            hit.symbol.code.as_str(),
            hit.symbol.name.as_str(),
            hit.level.label(),
            hit.signal.kind.as_str(),
            hit.signal.time_label(hit.level).as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanscan_core::domain::{KlType, SignalEvent, Symbol};
    use chrono::NaiveDate;

    #[test]
    fn header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCAN_TABLE);
        let time = NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let hits = vec![SymbolHit {
            symbol: Symbol::new("600000", "浦发银行"),
            level: KlType::Day,
            signal: SignalEvent::entry("1,2", time, Some(7.5)),
            handle: None,
        }];

        write_scan_table(&path, &hits).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Code,Name,Level,Signal Type,Signal Time"));
        assert_eq!(lines.next(), Some("600000,浦发银行,日线,\"1,2\",2024/06/03"));
        assert_eq!(lines.next(), None);
    }
}
