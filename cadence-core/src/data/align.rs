//! Multi-asset time alignment.
//!
//! Merges per-asset bar series onto one ascending timeline (the deduplicated
//! union of all timestamps). Missing bars are never fabricated: an asset with
//! no bar at a timestamp gets an explicit `BarSlot::NoBar` for that step. It
//! is not tradable there, and its mark carries forward from its last close.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, BTreeSet};

use super::validate::validate_series;
use crate::domain::{Asset, Bar};
use crate::error::SetupError;

/// Aligned bar data for all assets on a common, immutable timeline.
#[derive(Debug, Clone)]
pub struct Timeline {
    timestamps: Vec<NaiveDateTime>,
    bars: BTreeMap<Asset, Vec<Bar>>,
    /// Per asset, per step: index of the asset's bar at that step, if any.
    slots: BTreeMap<Asset, Vec<Option<usize>>>,
    /// Per asset, per step: number of the asset's bars with timestamp <= step.
    visible_len: BTreeMap<Asset, Vec<usize>>,
}

impl Timeline {
    /// Validate every series and align them on the union of their timestamps.
    pub fn align(series: BTreeMap<Asset, Vec<Bar>>) -> Result<Self, SetupError> {
        if series.is_empty() {
            return Err(SetupError::EmptyUniverse);
        }
        for (asset, bars) in &series {
            validate_series(asset, bars)?;
        }

        let timestamps: Vec<NaiveDateTime> = series
            .values()
            .flat_map(|bars| bars.iter().map(|b| b.timestamp))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut slots = BTreeMap::new();
        let mut visible_len = BTreeMap::new();

        for (asset, bars) in &series {
            let mut asset_slots = Vec::with_capacity(timestamps.len());
            let mut asset_visible = Vec::with_capacity(timestamps.len());
            let mut cursor = 0;

            for ts in &timestamps {
                if cursor < bars.len() && bars[cursor].timestamp == *ts {
                    asset_slots.push(Some(cursor));
                    cursor += 1;
                } else {
                    asset_slots.push(None);
                }
                asset_visible.push(cursor);
            }

            slots.insert(asset.clone(), asset_slots);
            visible_len.insert(asset.clone(), asset_visible);
        }

        Ok(Self {
            timestamps,
            bars: series,
            slots,
            visible_len,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.bars.keys()
    }

    pub fn asset_count(&self) -> usize {
        self.bars.len()
    }

    pub fn contains_asset(&self, asset: &str) -> bool {
        self.bars.contains_key(asset)
    }

    /// Distinct dates covered by the timeline, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.timestamps.iter().map(|t| t.date()).collect();
        dates.dedup();
        dates
    }

    /// Lazy, non-restartable walk over the timeline.
    pub fn steps(&self) -> Steps<'_> {
        Steps {
            timeline: self,
            next: 0,
        }
    }

    /// The asset's bar at step `index`, if it has one.
    pub fn slot(&self, asset: &str, index: usize) -> BarSlot<'_> {
        let bar = self
            .slots
            .get(asset)
            .and_then(|s| s.get(index).copied().flatten())
            .and_then(|i| self.bars.get(asset).map(|bars| &bars[i]));
        match bar {
            Some(bar) => BarSlot::Bar(bar),
            None => BarSlot::NoBar,
        }
    }

    /// The asset's bars with timestamp <= the timestamp of step `index`.
    pub fn visible(&self, asset: &str, index: usize) -> &[Bar] {
        match (self.bars.get(asset), self.visible_len.get(asset)) {
            (Some(bars), Some(lens)) => {
                let len = lens.get(index).copied().unwrap_or(0);
                &bars[..len]
            }
            _ => &[],
        }
    }
}

/// One asset's state at one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BarSlot<'a> {
    Bar(&'a Bar),
    NoBar,
}

impl<'a> BarSlot<'a> {
    pub fn bar(&self) -> Option<&'a Bar> {
        match self {
            BarSlot::Bar(bar) => Some(bar),
            BarSlot::NoBar => None,
        }
    }

    pub fn is_bar(&self) -> bool {
        matches!(self, BarSlot::Bar(_))
    }
}

/// Iterator over timeline steps. Deliberately not `Clone`.
#[derive(Debug)]
pub struct Steps<'a> {
    timeline: &'a Timeline,
    next: usize,
}

impl<'a> Iterator for Steps<'a> {
    type Item = Step<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.timeline.len() {
            return None;
        }
        let step = Step {
            timeline: self.timeline,
            index: self.next,
        };
        self.next += 1;
        Some(step)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.timeline.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Steps<'_> {}

/// A single position on the timeline.
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    timeline: &'a Timeline,
    index: usize,
}

impl<'a> Step<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timeline.timestamps[self.index]
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp().date()
    }

    pub fn time(&self) -> NaiveTime {
        self.timestamp().time()
    }

    pub fn slot(&self, asset: &str) -> BarSlot<'a> {
        self.timeline.slot(asset, self.index)
    }

    /// Every asset with its slot at this step, in asset order.
    pub fn slots(&self) -> impl Iterator<Item = (&'a Asset, BarSlot<'a>)> + 'a {
        let timeline = self.timeline;
        let index = self.index;
        timeline
            .assets()
            .map(move |asset| (asset, timeline.slot(asset, index)))
    }

    /// Assets with a bar at this step, with that bar.
    pub fn bars(&self) -> impl Iterator<Item = (&'a Asset, &'a Bar)> + 'a {
        self.slots()
            .filter_map(|(asset, slot)| slot.bar().map(|bar| (asset, bar)))
    }
}
