//! Bar sequence validation.
//!
//! Input series are expected to be cleaned upstream. These checks only catch
//! what would corrupt the timeline: empty series, out-of-order or duplicate
//! timestamps, and bars that cannot be priced.

use crate::domain::Bar;
use crate::error::SetupError;

/// Validate one asset's bar series.
pub fn validate_series(asset: &str, bars: &[Bar]) -> Result<(), SetupError> {
    if bars.is_empty() {
        return Err(SetupError::EmptySeries(asset.to_string()));
    }

    for bar in bars {
        if let Some(reason) = bar.defect() {
            return Err(SetupError::InvalidBar {
                asset: asset.to_string(),
                timestamp: bar.timestamp,
                reason: reason.to_string(),
            });
        }
    }

    for pair in bars.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(SetupError::UnorderedBars {
                asset: asset.to_string(),
                timestamp: pair[1].timestamp,
            });
        }
    }

    Ok(())
}
