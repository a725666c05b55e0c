//! Screening pipeline
//!
//! One bulk price fetch for the whole universe, then an isolated evaluation
//! per symbol: normalize, indicators, patterns, fundamentals, score. A symbol
//! that fails is skipped and reported; only the bulk fetch can fail the run.
//!
//! ```rust,ignore
//! let cache = FundamentalCache::new(my_fundamentals);
//! let screener = Screener::new(my_market, cache, ScreenerConfig::default())?;
//! let report = screener.run()?;
//! println!("{}", report.summary());
//! ```

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    detectors::{CandleScanner, PatternResult, ScannerBuilder},
    fundamentals::{FundamentalSnapshot, FundamentalSource},
    indicators::{IndicatorFrame, IndicatorSettings},
    policy::ScoringPolicy,
    provider::{GroupBy, HistoryPeriod, MarketData, ProviderError, Universe},
    scoring::{ScoreResult, Scorer},
    series::{RawTable, Series},
    Error,
};

// ============================================================
// ERRORS
// ============================================================

/// Why one symbol was skipped
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("{symbol}: no price data")]
    DataUnavailable { symbol: String },

    #[error("{symbol}: missing from bulk response")]
    MissingFromBatch { symbol: String },

    #[error("{symbol}: {source}")]
    Provider {
        symbol: String,
        #[source]
        source: ProviderError,
    },
}

impl EvalError {
    pub fn symbol(&self) -> &str {
        match self {
            EvalError::DataUnavailable { symbol }
            | EvalError::MissingFromBatch { symbol }
            | EvalError::Provider { symbol, .. } => symbol,
        }
    }
}

/// Failure of a whole screening run
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScreenError {
    #[error("Bulk price fetch failed: {0}")]
    BulkFetch(#[source] ProviderError),

    #[error(transparent)]
    Config(#[from] Error),
}

// ============================================================
// CONFIG
// ============================================================

/// Sub-score used for filtering and ranking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    Composite,
    Technical,
    MoneyFlow,
    Fundamental,
    Pattern,
}

impl SortKey {
    pub fn value(self, score: &ScoreResult) -> f64 {
        match self {
            SortKey::Composite => score.composite,
            SortKey::Technical => score.scores.technical,
            SortKey::MoneyFlow => score.scores.money_flow,
            SortKey::Fundamental => score.scores.fundamental,
            SortKey::Pattern => score.scores.pattern,
        }
    }
}

/// Which scored rows make it into the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum Inclusion {
    #[default]
    All,
    /// `key` value at least `threshold`
    MinScore { key: SortKey, threshold: f64 },
    /// Any pattern matched on the latest bar
    HasPattern,
}

impl Inclusion {
    pub fn accepts(&self, row: &ScreenRow) -> bool {
        match *self {
            Inclusion::All => true,
            Inclusion::MinScore { key, threshold } => key.value(&row.score) >= threshold,
            Inclusion::HasPattern => row.pattern.weight > 0.0 || !row.pattern.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    pub universe: Universe,
    pub period: HistoryPeriod,
    pub group_by: GroupBy,
    pub inclusion: Inclusion,
    pub sort_key: SortKey,
    /// Evaluate symbols on the rayon pool
    pub parallel: bool,
    pub policy: ScoringPolicy,
    pub indicators: IndicatorSettings,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            universe: Universe::jakarta_islamic_30(),
            period: HistoryPeriod::SixMonths,
            group_by: GroupBy::Ticker,
            inclusion: Inclusion::All,
            sort_key: SortKey::Composite,
            parallel: false,
            policy: ScoringPolicy::default(),
            indicators: IndicatorSettings::default(),
        }
    }
}

impl ScreenerConfig {
    pub fn validate(&self) -> crate::Result<()> {
        self.policy.validate()?;
        self.indicators.validate()?;
        if let Inclusion::MinScore { threshold, .. } = self.inclusion {
            if !threshold.is_finite() {
                return Err(Error::InvalidValue("inclusion threshold must be finite"));
            }
        }
        Ok(())
    }
}

// ============================================================
// PROGRESS & CANCELLATION
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    pub symbol: String,
}

/// Receives a notification after each evaluated symbol
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: &Progress);
}

impl<F: Fn(&Progress) + Send + Sync> ProgressSink for F {
    fn on_progress(&self, progress: &Progress) {
        self(progress)
    }
}

/// Discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _progress: &Progress) {}
}

/// Shared flag checked before each symbol
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================
// OUTPUT
// ============================================================

/// Pre-formatted columns for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayFields {
    pub price: String,
    pub roe: String,
    pub pbv: String,
    pub per: String,
    pub der: String,
    pub reasons: String,
}

const ABSENT: &str = "-";

fn format_or_absent(value: Option<f64>, format: impl Fn(f64) -> String) -> String {
    value.map_or_else(|| ABSENT.to_string(), format)
}

/// Whole units with thousands separators, e.g. `12,350`
fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return ABSENT.to_string();
    }
    let digits = (price.trunc() as i64).unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if price < 0.0 && price.trunc() != 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}

impl DisplayFields {
    pub fn new(close: f64, fundamentals: Option<&FundamentalSnapshot>, score: &ScoreResult) -> Self {
        let field = |get: fn(&FundamentalSnapshot) -> Option<f64>| fundamentals.and_then(get);
        Self {
            price: format_price(close),
            roe: format_or_absent(field(|f| f.return_on_equity), |v| format!("{:.1}%", v * 100.0)),
            pbv: format_or_absent(field(|f| f.price_to_book), |v| format!("{v:.2}x")),
            per: format_or_absent(field(|f| f.price_to_earnings), |v| format!("{v:.1}x")),
            der: format_or_absent(field(|f| f.debt_to_equity), |v| format!("{v:.1}%")),
            reasons: score.reason_summary(),
        }
    }
}

/// One ranked symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenRow {
    /// Base ticker, suffix stripped
    pub ticker: String,
    /// Provider symbol
    pub symbol: String,
    pub close: f64,
    pub pattern: PatternResult,
    pub score: ScoreResult,
    pub fundamentals: Option<FundamentalSnapshot>,
    pub display: DisplayFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScreenStatus {
    Complete,
    /// Symbols were scored but the filter rejected all of them
    NoMatches,
    /// No symbol produced a usable series
    NoData,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenReport {
    pub rows: Vec<ScreenRow>,
    pub skipped: Vec<EvalError>,
    pub processed: usize,
    pub total: usize,
    pub status: ScreenStatus,
}

impl ScreenReport {
    pub fn summary(&self) -> String {
        match self.status {
            ScreenStatus::Complete => format!(
                "Screened {} of {} symbols: {} ranked, {} skipped",
                self.processed,
                self.total,
                self.rows.len(),
                self.skipped.len()
            ),
            ScreenStatus::NoMatches => format!(
                "Screened {} of {} symbols: none matched the filter",
                self.processed, self.total
            ),
            ScreenStatus::NoData => format!("No price data for any of {} symbols", self.total),
            ScreenStatus::Cancelled => format!(
                "Cancelled after {} of {} symbols: {} ranked",
                self.processed,
                self.total,
                self.rows.len()
            ),
        }
    }
}

/// Full detail for one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolAnalysis {
    pub symbol: String,
    pub frame: IndicatorFrame,
    pub pattern: PatternResult,
    pub fundamentals: Option<FundamentalSnapshot>,
    pub score: ScoreResult,
}

/// Ranking order: `key` descending, ties by ticker ascending
pub fn rank(rows: &mut [ScreenRow], key: SortKey) {
    rows.sort_by(|a, b| {
        key.value(&b.score)
            .total_cmp(&key.value(&a.score))
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
}

// ============================================================
// SCREENER
// ============================================================

pub struct Screener<M, F> {
    market: M,
    fundamentals: F,
    config: ScreenerConfig,
    scanner: CandleScanner,
    scorer: Scorer,
}

impl<M: MarketData, F: FundamentalSource> Screener<M, F> {
    pub fn new(market: M, fundamentals: F, config: ScreenerConfig) -> Result<Self, ScreenError> {
        config.validate()?;
        let scanner = ScannerBuilder::new()
            .with_policy(&config.policy.patterns)
            .build()?;
        let scorer = Scorer::new(config.policy.clone());
        Ok(Self {
            market,
            fundamentals,
            config,
            scanner,
            scorer,
        })
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    pub fn market(&self) -> &M {
        &self.market
    }

    pub fn fundamentals(&self) -> &F {
        &self.fundamentals
    }

    pub fn run(&self) -> Result<ScreenReport, ScreenError> {
        self.run_with(&NoProgress, &CancelToken::default())
    }

    pub fn run_with(
        &self,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<ScreenReport, ScreenError> {
        let symbols = self.config.universe.provider_symbols();
        let total = symbols.len();
        log::info!("screening {total} symbols over {}", self.config.period);

        let tables = self
            .market
            .fetch_bars_bulk(&symbols, self.config.period, self.config.group_by)
            .map_err(ScreenError::BulkFetch)?;

        let processed = AtomicUsize::new(0);
        let evaluate = |symbol: &String| -> Option<Result<ScreenRow, EvalError>> {
            if cancel.is_cancelled() {
                return None;
            }
            let outcome = match tables.get(symbol) {
                Some(table) => self.evaluate(symbol, table),
                None => Err(EvalError::MissingFromBatch {
                    symbol: symbol.clone(),
                }),
            };
            let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
            progress.on_progress(&Progress {
                processed: done,
                total,
                symbol: symbol.clone(),
            });
            Some(outcome)
        };

        let outcomes: Vec<_> = if self.config.parallel {
            symbols.par_iter().map(evaluate).collect()
        } else {
            symbols.iter().map(evaluate).collect()
        };

        let cancelled = outcomes.iter().any(Option::is_none);
        let mut scored = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(row) => scored.push(row),
                Err(e) => {
                    log::warn!("skipping {e}");
                    skipped.push(e);
                }
            }
        }

        let any_scored = !scored.is_empty();
        let mut rows: Vec<ScreenRow> = scored
            .into_iter()
            .filter(|row| self.config.inclusion.accepts(row))
            .collect();
        rank(&mut rows, self.config.sort_key);

        let status = if cancelled {
            ScreenStatus::Cancelled
        } else if !any_scored {
            ScreenStatus::NoData
        } else if rows.is_empty() {
            ScreenStatus::NoMatches
        } else {
            ScreenStatus::Complete
        };

        let report = ScreenReport {
            rows,
            skipped,
            processed: processed.load(Ordering::SeqCst),
            total,
            status,
        };
        log::info!("{}", report.summary());
        Ok(report)
    }

    /// Detail view: one year of history for a user-entered ticker
    pub fn analyze(&self, ticker: &str) -> Result<SymbolAnalysis, EvalError> {
        let symbol = self.config.universe.resolve(ticker);
        let table = self
            .market
            .fetch_bars(&symbol, HistoryPeriod::OneYear)
            .map_err(|source| EvalError::Provider {
                symbol: symbol.clone(),
                source,
            })?;
        let series = table.normalize();
        if series.is_empty() {
            return Err(EvalError::DataUnavailable { symbol });
        }
        Ok(self.analyze_series(&symbol, &series))
    }

    pub fn analyze_series(&self, symbol: &str, series: &Series) -> SymbolAnalysis {
        let frame = IndicatorFrame::compute(series, &self.config.indicators);
        let pattern = self
            .scanner
            .scan_latest(series, frame.latest().and_then(|row| row.rsi));
        let fundamentals = match self.fundamentals.fetch_fundamentals(symbol) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("fundamentals for {symbol} unavailable: {e}");
                None
            }
        };
        let score = self.scorer.score(&frame, &pattern, fundamentals.as_ref());

        SymbolAnalysis {
            symbol: symbol.to_string(),
            frame,
            pattern,
            fundamentals,
            score,
        }
    }

    fn evaluate(&self, symbol: &str, table: &RawTable) -> Result<ScreenRow, EvalError> {
        let series = table.normalize();
        let Some(close) = series.last().map(|bar| bar.close) else {
            return Err(EvalError::DataUnavailable {
                symbol: symbol.to_string(),
            });
        };

        let analysis = self.analyze_series(symbol, &series);
        let display = DisplayFields::new(close, analysis.fundamentals.as_ref(), &analysis.score);
        Ok(ScreenRow {
            ticker: self.config.universe.base_ticker(symbol).to_string(),
            symbol: analysis.symbol,
            close,
            pattern: analysis.pattern,
            score: analysis.score,
            fundamentals: analysis.fundamentals,
            display,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;
    use crate::Bar;

    struct MockMarket {
        tables: HashMap<String, RawTable>,
        fail_bulk: bool,
    }

    impl MarketData for MockMarket {
        fn fetch_bars_bulk(
            &self,
            symbols: &[String],
            _period: HistoryPeriod,
            _group_by: GroupBy,
        ) -> Result<HashMap<String, RawTable>, ProviderError> {
            if self.fail_bulk {
                return Err(ProviderError::Unreachable("offline".to_string()));
            }
            Ok(symbols
                .iter()
                .filter_map(|s| self.tables.get(s).map(|t| (s.clone(), t.clone())))
                .collect())
        }

        fn fetch_bars(&self, symbol: &str, _period: HistoryPeriod) -> Result<RawTable, ProviderError> {
            self.tables
                .get(symbol)
                .cloned()
                .ok_or_else(|| ProviderError::Other(format!("unknown symbol {symbol}")))
        }
    }

    fn table(n: usize, drift: f64) -> RawTable {
        let bars = (0..n)
            .map(|i| {
                let c = 100.0 + drift * i as f64 + (i as f64 * 0.9).sin();
                Bar::new(i as i64 * 86_400, c - 0.3, c + 1.0, c - 1.0, c, 10_000.0)
            })
            .collect();
        Series::from_bars(bars).unwrap().to_table()
    }

    fn universe(tickers: &[&str]) -> Universe {
        Universe::new(tickers.iter().copied(), ".JK")
    }

    fn screener(
        tables: Vec<(&str, RawTable)>,
        config: ScreenerConfig,
    ) -> Screener<MockMarket, HashMap<String, FundamentalSnapshot>> {
        let market = MockMarket {
            tables: tables.into_iter().map(|(s, t)| (s.to_string(), t)).collect(),
            fail_bulk: false,
        };
        Screener::new(market, HashMap::new(), config).unwrap()
    }

    #[test]
    fn test_failing_symbol_is_skipped() {
        let config = ScreenerConfig {
            universe: universe(&["AAA", "BBB"]),
            ..ScreenerConfig::default()
        };
        let s = screener(vec![("BBB.JK", table(60, 0.2))], config);
        let report = s.run().unwrap();
        assert_eq!(report.status, ScreenStatus::Complete);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].ticker, "BBB");
        assert_eq!(report.rows[0].symbol, "BBB.JK");
        assert_eq!(
            report.skipped,
            vec![EvalError::MissingFromBatch {
                symbol: "AAA.JK".to_string()
            }]
        );
        assert_eq!(report.processed, 2);
    }

    #[test]
    fn test_empty_table_is_data_unavailable() {
        let config = ScreenerConfig {
            universe: universe(&["AAA"]),
            ..ScreenerConfig::default()
        };
        let s = screener(vec![("AAA.JK", RawTable::new(Vec::new()))], config);
        let report = s.run().unwrap();
        assert_eq!(report.status, ScreenStatus::NoData);
        assert!(matches!(report.skipped[0], EvalError::DataUnavailable { .. }));
        assert!(report.summary().contains("No price data"));
    }

    #[test]
    fn test_bulk_failure_is_hard_error() {
        let market = MockMarket {
            tables: HashMap::new(),
            fail_bulk: true,
        };
        let s = Screener::new(market, HashMap::new(), ScreenerConfig::default()).unwrap();
        assert!(matches!(s.run(), Err(ScreenError::BulkFetch(_))));
    }

    #[test]
    fn test_ties_ordered_by_ticker() {
        let config = ScreenerConfig {
            universe: universe(&["CCC", "AAA", "BBB"]),
            ..ScreenerConfig::default()
        };
        let t = table(60, 0.1);
        let s = screener(
            vec![("CCC.JK", t.clone()), ("AAA.JK", t.clone()), ("BBB.JK", t)],
            config,
        );
        let report = s.run().unwrap();
        let tickers: Vec<&str> = report.rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAA", "BBB", "CCC"]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let tickers = ["AAA", "BBB", "CCC", "DDD", "EEE"];
        let tables: Vec<(String, RawTable)> = tickers
            .iter()
            .enumerate()
            .map(|(i, t)| (format!("{t}.JK"), table(60, i as f64 * 0.3 - 0.6)))
            .collect();
        let run = |parallel| {
            let config = ScreenerConfig {
                universe: universe(&tickers),
                parallel,
                ..ScreenerConfig::default()
            };
            screener(
                tables.iter().map(|(s, t)| (s.as_str(), t.clone())).collect(),
                config,
            )
            .run()
            .unwrap()
        };
        assert_eq!(run(true), run(false));
    }

    #[test]
    fn test_progress_reported_per_symbol() {
        let config = ScreenerConfig {
            universe: universe(&["AAA", "BBB"]),
            ..ScreenerConfig::default()
        };
        let s = screener(vec![("AAA.JK", table(40, 0.0)), ("BBB.JK", table(40, 0.0))], config);
        let seen = Mutex::new(Vec::new());
        let sink = |p: &Progress| seen.lock().unwrap().push((p.processed, p.symbol.clone()));
        s.run_with(&sink, &CancelToken::new()).unwrap();
        assert_eq!(
            seen.into_inner().unwrap(),
            vec![(1, "AAA.JK".to_string()), (2, "BBB.JK".to_string())]
        );
    }

    #[test]
    fn test_cancel_keeps_computed_rows() {
        let config = ScreenerConfig {
            universe: universe(&["AAA", "BBB", "CCC"]),
            ..ScreenerConfig::default()
        };
        let t = table(40, 0.0);
        let s = screener(
            vec![("AAA.JK", t.clone()), ("BBB.JK", t.clone()), ("CCC.JK", t)],
            config,
        );
        let cancel = CancelToken::new();
        let sink = |p: &Progress| {
            if p.processed == 1 {
                cancel.cancel();
            }
        };
        let report = s.run_with(&sink, &cancel).unwrap();
        assert_eq!(report.status, ScreenStatus::Cancelled);
        assert_eq!(report.processed, 1);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].ticker, "AAA");
    }

    #[test]
    fn test_inclusion_filters() {
        let config = ScreenerConfig {
            universe: universe(&["AAA"]),
            inclusion: Inclusion::MinScore {
                key: SortKey::Fundamental,
                threshold: 1.0,
            },
            ..ScreenerConfig::default()
        };
        // no fundamentals, so the fundamental sub-score is 0
        let s = screener(vec![("AAA.JK", table(40, 0.0))], config);
        let report = s.run().unwrap();
        assert_eq!(report.status, ScreenStatus::NoMatches);
        assert!(report.rows.is_empty());
    }

    #[test]
    fn test_analyze_resolves_ticker() {
        let config = ScreenerConfig {
            universe: universe(&[]),
            ..ScreenerConfig::default()
        };
        let s = screener(vec![("ADRO.JK", table(250, 0.1))], config);
        let analysis = s.analyze("adro").unwrap();
        assert_eq!(analysis.symbol, "ADRO.JK");
        assert_eq!(analysis.frame.len(), 250);
        assert!(analysis.fundamentals.is_none());
        assert!(analysis
            .score
            .reasons
            .contains(&crate::scoring::FUNDAMENTAL_UNAVAILABLE.to_string()));

        assert!(matches!(s.analyze("zzzz"), Err(EvalError::Provider { .. })));
    }

    #[test]
    fn test_display_fields() {
        let snapshot = FundamentalSnapshot {
            price_to_book: Some(1.234),
            price_to_earnings: Some(9.5),
            return_on_equity: Some(0.153),
            debt_to_equity: None,
            market_cap: None,
        };
        let score = ScoreResult::insufficient();
        let display = DisplayFields::new(12_350.7, Some(&snapshot), &score);
        assert_eq!(display.price, "12,350");
        assert_eq!(display.roe, "15.3%");
        assert_eq!(display.pbv, "1.23x");
        assert_eq!(display.per, "9.5x");
        assert_eq!(display.der, "-");
        assert_eq!(display.reasons, "insufficient data");

        let none = DisplayFields::new(950.0, None, &score);
        assert_eq!(none.price, "950");
        assert_eq!(none.pbv, "-");
    }

    #[test]
    fn test_config_rejects_bad_threshold() {
        let config = ScreenerConfig {
            inclusion: Inclusion::MinScore {
                key: SortKey::Composite,
                threshold: f64::NAN,
            },
            ..ScreenerConfig::default()
        };
        let market = MockMarket {
            tables: HashMap::new(),
            fail_bulk: false,
        };
        assert!(matches!(
            Screener::new(market, HashMap::new(), config),
            Err(ScreenError::Config(_))
        ));
    }
}
