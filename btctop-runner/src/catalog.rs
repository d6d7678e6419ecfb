//! Indicator definitions: display metadata plus the recipe that computes `current`.
//!
//! The built-in catalog reproduces the dashboard's eight indicators. A config
//! file may replace it wholesale with its own `[[indicators]]` tables.

use btctop_core::domain::{Direction, Indicator, InvariantError};
use btctop_core::sources::{Provider, SeriesKey};
use serde::{Deserialize, Serialize};

pub const FED_BALANCE_SHEET: &str = "WALCL";
pub const TREASURY_GENERAL_ACCOUNT: &str = "WTREGEN";
pub const REVERSE_REPO: &str = "RRPONTSYD";
pub const SPOT_BTC_ETF: &str = "spotBTC";

/// Upper bound on any recipe window, in days.
const MAX_LOOKBACK_DAYS: i64 = 3650;

/// How an indicator's `current` value is derived from fetched series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recipe {
    /// Year-over-year % change of a FRED series.
    Yoy { series: String },

    /// Z-score of the latest FRED observation over the last `window`
    /// observations. `cadence_days` is the spacing between observations and
    /// sizes the fetch window.
    Zscore {
        series: String,
        window: usize,
        #[serde(default = "default_cadence_days")]
        cadence_days: i64,
    },

    /// Balance sheet YoY minus TGA YoY minus RRP YoY.
    NetLiquidity {
        balance_sheet: String,
        tga: String,
        rrp: String,
    },

    /// Change of the net liquidity series over `window_days`, in percentage points.
    NetLiquidityImpulse {
        balance_sheet: String,
        tga: String,
        rrp: String,
        window_days: i64,
    },

    /// Market-cap weighted N-day supply growth across stablecoins (CoinGecko ids).
    StablecoinGrowth { coins: Vec<String>, window_days: i64 },

    /// Share of total crypto market cap held by one coin (CoinGecko symbol key).
    Dominance { symbol: String },

    /// Sum of the last `days` daily ETF net flows.
    EtfNetFlow {
        #[serde(default = "default_etf_series")]
        series: String,
        days: usize,
    },
}

fn default_etf_series() -> String {
    SPOT_BTC_ETF.to_string()
}

/// FRED's H.4.1 series are weekly.
fn default_cadence_days() -> i64 {
    7
}

impl Recipe {
    /// Every series this recipe reads, in a stable order.
    pub fn required_series(&self) -> Vec<SeriesKey> {
        match self {
            Recipe::Yoy { series } | Recipe::Zscore { series, .. } => {
                vec![SeriesKey::new(Provider::Fred, series.as_str())]
            }
            Recipe::NetLiquidity {
                balance_sheet,
                tga,
                rrp,
            }
            | Recipe::NetLiquidityImpulse {
                balance_sheet,
                tga,
                rrp,
                ..
            } => [balance_sheet, tga, rrp]
                .into_iter()
                .map(|id| SeriesKey::new(Provider::Fred, id.as_str()))
                .collect(),
            Recipe::StablecoinGrowth { coins, .. } => coins
                .iter()
                .map(|id| SeriesKey::new(Provider::CoinGeckoMarketCap, id.as_str()))
                .collect(),
            Recipe::Dominance { symbol } => {
                vec![SeriesKey::new(Provider::CoinGeckoDominance, symbol.as_str())]
            }
            Recipe::EtfNetFlow { series, .. } => {
                vec![SeriesKey::new(Provider::SoSoValueEtf, series.as_str())]
            }
        }
    }

    /// Longest lookback in days the recipe needs behind the latest observation.
    pub fn lookback_days(&self) -> i64 {
        match self {
            Recipe::Yoy { .. } | Recipe::NetLiquidity { .. } => btctop_core::transform::YEAR_DAYS,
            // Impulse differences a YoY series, so it needs a year plus the window.
            Recipe::NetLiquidityImpulse { window_days, .. } => {
                btctop_core::transform::YEAR_DAYS + window_days
            }
            Recipe::StablecoinGrowth { window_days, .. } => *window_days,
            Recipe::Zscore {
                window,
                cadence_days,
                ..
            } => i64::try_from(*window)
                .ok()
                .and_then(|w| w.checked_mul(*cadence_days))
                .unwrap_or(i64::MAX),
            Recipe::Dominance { .. } => 0,
            Recipe::EtfNetFlow { days, .. } => i64::try_from(*days).unwrap_or(i64::MAX),
        }
    }

    fn check(&self) -> Result<(), String> {
        if self.lookback_days() > MAX_LOOKBACK_DAYS {
            return Err(format!(
                "lookback of {} days exceeds {MAX_LOOKBACK_DAYS}",
                self.lookback_days()
            ));
        }
        match self {
            Recipe::Zscore { window, .. } if *window < 2 => {
                Err(format!("zscore window must be at least 2, got {window}"))
            }
            Recipe::Zscore { cadence_days, .. } if *cadence_days <= 0 => Err(format!(
                "zscore cadence_days must be positive, got {cadence_days}"
            )),
            Recipe::NetLiquidityImpulse { window_days, .. } if *window_days <= 0 => {
                Err(format!("impulse window_days must be positive, got {window_days}"))
            }
            Recipe::StablecoinGrowth { coins, .. } if coins.is_empty() => {
                Err("stablecoin_growth needs at least one coin".to_string())
            }
            Recipe::StablecoinGrowth { window_days, .. } if *window_days <= 0 => {
                Err(format!("growth window_days must be positive, got {window_days}"))
            }
            Recipe::EtfNetFlow { days: 0, .. } => {
                Err("etf_net_flow days must be positive".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// One dashboard row: fixed metadata and the recipe for its value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndicatorDef {
    pub name: String,
    pub category: String,
    #[serde(rename = "ref")]
    pub reference: f64,
    pub direction: Direction,
    #[serde(default)]
    pub unit: String,
    pub strength: f64,
    pub recipe: Recipe,
}

impl IndicatorDef {
    /// The persisted record for a freshly computed value.
    pub fn to_indicator(&self, current: f64) -> Indicator {
        Indicator {
            name: self.name.clone(),
            category: self.category.clone(),
            current,
            reference: self.reference,
            direction: self.direction,
            unit: self.unit.clone(),
            strength: self.strength,
        }
    }

    pub fn required_series(&self) -> Vec<SeriesKey> {
        self.recipe.required_series()
    }

    /// Metadata invariants (the same ones a persisted indicator must satisfy)
    /// plus recipe parameter sanity.
    pub fn validate(&self) -> Result<(), String> {
        self.to_indicator(0.0)
            .validate()
            .map_err(|e: InvariantError| e.to_string())?;
        self.recipe
            .check()
            .map_err(|e| format!("indicator '{}': {e}", self.name))
    }
}

fn def(
    name: &str,
    category: &str,
    reference: f64,
    direction: Direction,
    unit: &str,
    strength: f64,
    recipe: Recipe,
) -> IndicatorDef {
    IndicatorDef {
        name: name.to_string(),
        category: category.to_string(),
        reference,
        direction,
        unit: unit.to_string(),
        strength,
        recipe,
    }
}

fn fred_triplet() -> (String, String, String) {
    (
        FED_BALANCE_SHEET.to_string(),
        TREASURY_GENERAL_ACCOUNT.to_string(),
        REVERSE_REPO.to_string(),
    )
}

/// The dashboard's default indicator set, in display order.
pub fn default_catalog() -> Vec<IndicatorDef> {
    let (bs, tga, rrp) = fred_triplet();
    vec![
        def(
            "RRP YoY",
            "Liquidity",
            20.0,
            Direction::HigherWorse,
            "%",
            0.5,
            Recipe::Yoy {
                series: REVERSE_REPO.to_string(),
            },
        ),
        def(
            "TGA YoY",
            "Liquidity",
            20.0,
            Direction::HigherWorse,
            "%",
            0.5,
            Recipe::Yoy {
                series: TREASURY_GENERAL_ACCOUNT.to_string(),
            },
        ),
        def(
            "Fed Balance Sheet YoY",
            "Liquidity",
            -10.0,
            Direction::LowerWorse,
            "%",
            0.7,
            Recipe::Yoy {
                series: FED_BALANCE_SHEET.to_string(),
            },
        ),
        def(
            "Net Liquidity",
            "Liquidity",
            -20.0,
            Direction::LowerWorse,
            "%",
            0.8,
            Recipe::NetLiquidity {
                balance_sheet: bs.clone(),
                tga: tga.clone(),
                rrp: rrp.clone(),
            },
        ),
        def(
            "Net Liquidity Impulse",
            "Liquidity",
            -10.0,
            Direction::LowerWorse,
            "pp",
            0.6,
            Recipe::NetLiquidityImpulse {
                balance_sheet: bs,
                tga,
                rrp,
                window_days: 90,
            },
        ),
        def(
            "Stablecoin Supply 90d Growth",
            "Stablecoins",
            20.0,
            Direction::HigherWorse,
            "%",
            0.6,
            Recipe::StablecoinGrowth {
                coins: vec!["tether".to_string(), "usd-coin".to_string()],
                window_days: 90,
            },
        ),
        def(
            "USDT Dominance",
            "Stablecoins",
            4.0,
            Direction::LowerWorse,
            "%",
            0.5,
            Recipe::Dominance {
                symbol: "usdt".to_string(),
            },
        ),
        def(
            "ETF Net Flow 5d",
            "Flows",
            -1.0e9,
            Direction::LowerWorse,
            "USD",
            0.7,
            Recipe::EtfNetFlow {
                series: SPOT_BTC_ETF.to_string(),
                days: 5,
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn default_catalog_is_valid_and_unique() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 8);
        for d in &catalog {
            d.validate().unwrap();
        }
        let names: BTreeSet<&str> = catalog.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names.len(), catalog.len());
    }

    #[test]
    fn fred_indicators_share_series() {
        let keys: BTreeSet<SeriesKey> = default_catalog()
            .iter()
            .flat_map(IndicatorDef::required_series)
            .filter(|k| k.provider == Provider::Fred)
            .collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn recipe_toml_shape() {
        let def: IndicatorDef = toml::from_str(
            r#"
            name = "ETF Net Flow 5d"
            category = "Flows"
            ref = -1e9
            direction = "lower_worse"
            unit = "USD"
            strength = 0.7
            recipe = { type = "etf_net_flow", days = 5 }
            "#,
        )
        .unwrap();
        assert_eq!(
            def.recipe,
            Recipe::EtfNetFlow {
                series: SPOT_BTC_ETF.to_string(),
                days: 5
            }
        );
        assert_eq!(def.reference, -1e9);
    }

    #[test]
    fn impulse_lookback_covers_year_and_window() {
        let recipe = Recipe::NetLiquidityImpulse {
            balance_sheet: "a".into(),
            tga: "b".into(),
            rrp: "c".into(),
            window_days: 90,
        };
        assert_eq!(recipe.lookback_days(), 455);
    }

    #[test]
    fn bad_recipe_params_rejected() {
        let mut d = default_catalog().remove(5);
        d.recipe = Recipe::StablecoinGrowth {
            coins: vec![],
            window_days: 90,
        };
        assert!(d.validate().is_err());

        d.recipe = Recipe::Zscore {
            series: "WALCL".into(),
            window: 1,
            cadence_days: 7,
        };
        assert!(d.validate().is_err());

        d.recipe = Recipe::Zscore {
            series: "WALCL".into(),
            window: 52,
            cadence_days: 0,
        };
        assert!(d.validate().is_err());
    }

    #[test]
    fn zscore_lookback_scales_with_cadence() {
        let recipe: Recipe = toml::from_str(
            r#"
            type = "zscore"
            series = "WALCL"
            window = 52
            "#,
        )
        .unwrap();
        assert_eq!(recipe.lookback_days(), 364);

        let daily = Recipe::Zscore {
            series: "RRPONTSYD".into(),
            window: 30,
            cadence_days: 1,
        };
        assert_eq!(daily.lookback_days(), 30);

        let huge = Recipe::Zscore {
            series: "WALCL".into(),
            window: usize::MAX,
            cadence_days: 7,
        };
        assert_eq!(huge.lookback_days(), i64::MAX);
    }

    #[test]
    fn strength_out_of_range_rejected() {
        let mut d = default_catalog().remove(0);
        d.strength = 1.5;
        assert!(d.validate().is_err());
    }
}
