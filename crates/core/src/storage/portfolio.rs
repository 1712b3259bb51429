use super::{JsonStore, PORTFOLIO_FILE};
use crate::domain::market::PortfolioPosition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PositionEntry {
    shares: f64,
    buy_nav: f64,
}

impl JsonStore {
    /// Held positions, ordered by ticker. Entries with non-positive shares are ignored.
    pub fn portfolio(&self) -> Vec<PortfolioPosition> {
        let entries: BTreeMap<String, PositionEntry> = self.load(PORTFOLIO_FILE);
        entries
            .into_iter()
            .filter(|(_, e)| e.shares > 0.0)
            .map(|(ticker, e)| PortfolioPosition {
                ticker,
                shares: e.shares,
                buy_nav: e.buy_nav,
            })
            .collect()
    }

    /// Replaces the portfolio document. The monitor itself never calls this; operators and
    /// fixtures do.
    pub fn replace_portfolio(&self, positions: &[PortfolioPosition]) -> anyhow::Result<()> {
        let _guard = self.lock();
        let entries: BTreeMap<String, PositionEntry> = positions
            .iter()
            .map(|p| {
                (
                    p.ticker.clone(),
                    PositionEntry {
                        shares: p.shares,
                        buy_nav: p.buy_nav,
                    },
                )
            })
            .collect();
        self.save(PORTFOLIO_FILE, &entries)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::testing::TempStore;
    use crate::storage::PORTFOLIO_FILE;

    #[test]
    fn reads_operator_supplied_portfolio_file() {
        let store = TempStore::new();
        std::fs::write(
            store.dir().join(PORTFOLIO_FILE),
            r#"{"YMAX": {"shares": 100, "buy_nav": 15.5}, "ULTY": {"shares": 0, "buy_nav": 6.0}}"#,
        )
        .unwrap();

        let positions = store.portfolio();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].ticker, "YMAX");
        assert_eq!(positions[0].shares, 100.0);
        assert!(positions.iter().all(|p| p.ticker != "ULTY"));
    }
}
