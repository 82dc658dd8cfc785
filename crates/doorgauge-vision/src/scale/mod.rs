// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scale resolution — establishes a page's mm-per-pixel factor.
//
// Modelled as an ordered list of strategies, short-circuiting on the first
// success, rather than nested conditionals. Resolution failing on a page is
// an expected outcome (`None`), not an error: detection and reporting
// continue, measurement does not.

pub mod bar_graphic;
pub mod text_ratio;

use std::sync::Arc;

use tracing::{debug, info, instrument};

use doorgauge_core::config::ScalePriority;
use doorgauge_core::types::Scale;
use doorgauge_document::PageImage;

use crate::ocr::TextRecognizer;
use bar_graphic::BarGraphicStrategy;
use text_ratio::TextRatioStrategy;

/// One way of establishing a page's scale.
pub trait ScaleStrategy: Send + Sync {
    /// Name used in logs and provenance decisions.
    fn name(&self) -> &'static str;

    /// Attempt to resolve the page's scale. `None` means this strategy found
    /// nothing usable; the chain moves on.
    fn resolve(&self, page: &PageImage) -> Option<Scale>;
}

/// Anything that can resolve a page's scale. The pipeline depends on this
/// trait rather than the concrete chain so tests can substitute fixed or
/// failing resolvers.
pub trait ResolveScale: Send + Sync {
    fn resolve(&self, page: &PageImage) -> Option<Scale>;
}

/// The ordered strategy chain.
pub struct ScaleResolver {
    strategies: Vec<Box<dyn ScaleStrategy>>,
}

impl ScaleResolver {
    /// Build a resolver from an explicit strategy list (mainly for tests).
    pub fn new(strategies: Vec<Box<dyn ScaleStrategy>>) -> Self {
        Self { strategies }
    }

    /// The production chain: text-ratio and bar-graphic recognition over a
    /// shared OCR engine, ordered by the configured priority.
    pub fn for_run(ocr: Arc<TextRecognizer>, priority: ScalePriority) -> Self {
        let text: Box<dyn ScaleStrategy> = Box::new(TextRatioStrategy::new(Arc::clone(&ocr)));
        let bar: Box<dyn ScaleStrategy> = Box::new(BarGraphicStrategy::new(ocr));

        let strategies = match priority {
            ScalePriority::TextFirst => vec![text, bar],
            ScalePriority::BarFirst => vec![bar, text],
        };
        Self { strategies }
    }

    /// Walk the chain, returning the first plausible scale.
    ///
    /// A strategy's candidate outside the plausibility band is rejected and
    /// the chain continues — an implausible factor would put every door width
    /// orders of magnitude off.
    #[instrument(skip_all, fields(page = page.index))]
    pub fn resolve(&self, page: &PageImage) -> Option<Scale> {
        for strategy in &self.strategies {
            match strategy.resolve(page) {
                Some(scale) if scale.is_plausible() => {
                    info!(
                        strategy = strategy.name(),
                        mm_per_px = scale.mm_per_px,
                        "Scale resolved"
                    );
                    return Some(scale);
                }
                Some(scale) => {
                    debug!(
                        strategy = strategy.name(),
                        mm_per_px = scale.mm_per_px,
                        "Implausible scale rejected"
                    );
                }
                None => {
                    debug!(strategy = strategy.name(), "Strategy found no scale");
                }
            }
        }
        info!(page = page.index, "Scale unresolved");
        None
    }
}

impl ResolveScale for ScaleResolver {
    fn resolve(&self, page: &PageImage) -> Option<Scale> {
        ScaleResolver::resolve(self, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use doorgauge_core::types::ScaleSource;
    use image::RgbImage;

    fn blank_page() -> PageImage {
        PageImage {
            index: 0,
            dpi: 400,
            image: RgbImage::from_pixel(10, 10, image::Rgb([255u8, 255, 255])),
        }
    }

    struct FixedStrategy {
        scale: Option<Scale>,
        calls: Arc<AtomicUsize>,
    }

    impl ScaleStrategy for FixedStrategy {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn resolve(&self, _page: &PageImage) -> Option<Scale> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.scale
        }
    }

    /// When the first strategy succeeds, the second is never consulted.
    #[test]
    fn chain_short_circuits_on_first_success() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));

        let resolver = ScaleResolver::new(vec![
            Box::new(FixedStrategy {
                scale: Scale::new(3.175, ScaleSource::TextRatio),
                calls: Arc::clone(&first_calls),
            }),
            Box::new(FixedStrategy {
                scale: Scale::new(1.0, ScaleSource::BarGraphic),
                calls: Arc::clone(&second_calls),
            }),
        ]);

        let scale = resolver.resolve(&blank_page()).unwrap();
        assert_eq!(scale.source, ScaleSource::TextRatio);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    /// A failed first strategy falls through to the second.
    #[test]
    fn chain_falls_through_on_failure() {
        let resolver = ScaleResolver::new(vec![
            Box::new(FixedStrategy {
                scale: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(FixedStrategy {
                scale: Scale::new(2.0, ScaleSource::BarGraphic),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        ]);

        let scale = resolver.resolve(&blank_page()).unwrap();
        assert_eq!(scale.source, ScaleSource::BarGraphic);
    }

    /// An implausible candidate is rejected and the chain continues.
    #[test]
    fn implausible_candidate_is_rejected() {
        let resolver = ScaleResolver::new(vec![
            Box::new(FixedStrategy {
                // 500 mm/px would make a 20 px door 10 metres wide.
                scale: Scale::new(500.0, ScaleSource::BarGraphic),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(FixedStrategy {
                scale: Scale::new(3.0, ScaleSource::TextRatio),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        ]);

        let scale = resolver.resolve(&blank_page()).unwrap();
        assert_eq!(scale.source, ScaleSource::TextRatio);
    }

    /// Every strategy failing resolves to `None`, not an error.
    #[test]
    fn exhausted_chain_is_unresolved() {
        let resolver = ScaleResolver::new(vec![Box::new(FixedStrategy {
            scale: None,
            calls: Arc::new(AtomicUsize::new(0)),
        })]);
        assert!(resolver.resolve(&blank_page()).is_none());
    }
}
