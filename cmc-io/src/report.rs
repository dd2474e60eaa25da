//! JSON reports of computed CMC curves.

use cmc_core::{CmcError, Result};
use cmc_stats::{CmcCurve, CmcPoint, Normalization};
use serde::Serialize;

/// Serializable view of a [`CmcCurve`] with its summary statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CurveReport<'a> {
    pub name: Option<&'a str>,
    pub n_ranks: usize,
    pub divisor: usize,
    pub normalization: Normalization,
    pub hits: usize,
    pub misses: usize,
    pub auc: f64,
    /// `None` for an empty curve.
    pub summary: Option<f64>,
    /// Area divided by `n_ranks`; `None` for an empty curve.
    pub area_per_rank: Option<f64>,
    pub points: Vec<CmcPoint>,
}

impl<'a> CurveReport<'a> {
    pub fn new(curve: &'a CmcCurve) -> Self {
        Self {
            name: curve.name(),
            n_ranks: curve.n_ranks(),
            divisor: curve.divisor(),
            normalization: curve.normalization(),
            hits: curve.hits(),
            misses: curve.misses(),
            auc: curve.auc(),
            summary: curve.curve_summary().ok(),
            area_per_rank: curve.area_per_rank().ok(),
            points: curve.points(),
        }
    }
}

/// Render a curve report as a JSON string.
pub fn curve_to_json(curve: &CmcCurve) -> Result<String> {
    serde_json::to_string(&CurveReport::new(curve)).map_err(|e| CmcError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmc_stats::{cmc_curve, CmcConfig, SimilarityMatrix};
    use serde_json::Value;

    #[test]
    fn json_report_fields() {
        let m = SimilarityMatrix::from_rows(&[&[0.1, 0.9], &[0.9, 0.1]]).unwrap();
        let curve = cmc_curve(&m, &CmcConfig::new(2).with_name("left"));
        let parsed: Value = serde_json::from_str(&curve_to_json(&curve).unwrap()).unwrap();

        assert_eq!(parsed["name"], "left");
        assert_eq!(parsed["n_ranks"], 2);
        assert_eq!(parsed["normalization"], "users");
        assert_eq!(parsed["summary"], 0.5);
        assert_eq!(parsed["area_per_rank"], 0.25);
        let points = parsed["points"].as_array().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1]["rank"], 2);
        assert_eq!(points[1]["recognition_rate"], 1.0);
    }

    #[test]
    fn empty_curve_has_null_summary() {
        let m = SimilarityMatrix::from_rows(&[&[1.0]]).unwrap();
        let curve = cmc_curve(&m, &CmcConfig::new(0));
        let parsed: Value = serde_json::from_str(&curve_to_json(&curve).unwrap()).unwrap();
        assert!(parsed["summary"].is_null());
        assert!(parsed["area_per_rank"].is_null());
        assert_eq!(parsed["misses"], 1);
    }
}
