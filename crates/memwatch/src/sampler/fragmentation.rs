//! Fragmentation scoring
//!
//! Heap fragmentation is reserved-but-unused heap; RSS fragmentation is
//! resident memory outside the heap. Both are clamped to [0, 1].

use crate::config::FragmentationBands;
use crate::models::{Fragmentation, FragmentationLevel, RawCounters};

pub fn assess(counters: &RawCounters, bands: &FragmentationBands) -> Fragmentation {
    let heap_fragmentation = ratio(
        counters.heap_total.saturating_sub(counters.heap_used),
        counters.heap_total,
    );
    let rss_fragmentation = ratio(
        counters
            .resident_set_size
            .saturating_sub(counters.heap_total),
        counters.resident_set_size,
    );
    let score = (heap_fragmentation + rss_fragmentation) / 2.0;

    Fragmentation {
        heap_fragmentation,
        rss_fragmentation,
        score,
        level: level_for(score, bands),
    }
}

pub fn level_for(score: f64, bands: &FragmentationBands) -> FragmentationLevel {
    if score >= bands.high {
        FragmentationLevel::High
    } else if score >= bands.medium {
        FragmentationLevel::Medium
    } else {
        FragmentationLevel::Low
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64).clamp(0.0, 1.0)
}
