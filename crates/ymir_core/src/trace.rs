//! # Trace Sink
//!
//! Optional append-only observability channel. Steps push events, ASCII
//! field dumps, and point/segment overlays; nothing in the pipeline ever
//! reads them back. Disabled sinks drop everything, so tracing a run is a
//! pure opt-in cost.

/// ASCII brightness ramp used by field dumps, darkest to brightest.
const RAMP: &[u8] = b" .:-=+*#%@";

/// A line segment overlay in pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    /// Segment start.
    pub from: (f64, f64),
    /// Segment end.
    pub to: (f64, f64),
}

/// One recorded observation.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    /// A labeled text event.
    Event {
        /// Event label.
        label: String,
        /// Free-form detail.
        detail: String,
    },
    /// An ASCII rendering of a per-tile field, one string per row.
    Dump {
        /// Dump label.
        label: String,
        /// Rendered rows, top row first.
        lines: Vec<String>,
    },
    /// A labeled set of tile coordinates.
    Points {
        /// Overlay label.
        label: String,
        /// Tile coordinates.
        points: Vec<(i32, i32)>,
    },
    /// A labeled set of segments.
    Segments {
        /// Overlay label.
        label: String,
        /// Segments in pixel space.
        segments: Vec<Segment>,
    },
}

/// Append-only event sink for one run.
#[derive(Clone, Debug, Default)]
pub struct TraceSink {
    enabled: bool,
    events: Vec<TraceEvent>,
}

impl TraceSink {
    /// A sink that records.
    #[must_use]
    pub fn enabled() -> Self {
        Self { enabled: true, events: Vec::new() }
    }

    /// A sink that drops everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self { enabled: false, events: Vec::new() }
    }

    /// True when this sink records.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records a text event.
    pub fn event(&mut self, label: &str, detail: impl Into<String>) {
        if !self.enabled {
            return;
        }
        let detail = detail.into();
        tracing::trace!(target: "ymir::trace", label, detail = detail.as_str());
        self.events.push(TraceEvent::Event { label: label.to_owned(), detail });
    }

    /// Records a point overlay.
    pub fn points(&mut self, label: &str, points: Vec<(i32, i32)>) {
        if !self.enabled {
            return;
        }
        self.events.push(TraceEvent::Points { label: label.to_owned(), points });
    }

    /// Records a segment overlay.
    pub fn segments(&mut self, label: &str, segments: Vec<Segment>) {
        if !self.enabled {
            return;
        }
        self.events.push(TraceEvent::Segments { label: label.to_owned(), segments });
    }

    /// Renders a byte field as ASCII art, `max` mapping to the brightest
    /// glyph.
    pub fn dump_bytes(&mut self, label: &str, width: u32, values: &[u8], max: u8) {
        if !self.enabled {
            return;
        }
        let lines = render_rows(width, values, |v| {
            if max == 0 {
                0
            } else {
                (usize::from(v) * (RAMP.len() - 1)) / usize::from(max)
            }
        });
        self.events.push(TraceEvent::Dump { label: label.to_owned(), lines });
    }

    /// Renders a signed field as ASCII art, normalized to its own range.
    pub fn dump_signed(&mut self, label: &str, width: u32, values: &[i16]) {
        if !self.enabled {
            return;
        }
        let lo = values.iter().copied().min().unwrap_or(0);
        let hi = values.iter().copied().max().unwrap_or(0);
        let span = i32::from(hi) - i32::from(lo);
        let lines = render_rows(width, values, |v| {
            if span == 0 {
                0
            } else {
                let t = i32::from(v) - i32::from(lo);
                (t as usize * (RAMP.len() - 1)) / span as usize
            }
        });
        self.events.push(TraceEvent::Dump { label: label.to_owned(), lines });
    }

    /// Everything recorded so far, in order.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn render_rows<T: Copy>(width: u32, values: &[T], glyph_index: impl Fn(T) -> usize) -> Vec<String> {
    let width = width.max(1) as usize;
    values
        .chunks(width)
        .map(|row| {
            row.iter()
                .map(|&v| char::from(RAMP[glyph_index(v).min(RAMP.len() - 1)]))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_sink_records_nothing() {
        let mut sink = TraceSink::disabled();
        sink.event("tectonics", "plates placed");
        sink.dump_bytes("uplift", 2, &[0, 255, 128, 64], 255);
        assert!(sink.is_empty());
    }

    #[test]
    fn byte_dump_maps_range_ends_to_ramp_ends() {
        let mut sink = TraceSink::enabled();
        sink.dump_bytes("uplift", 2, &[0, 255, 128, 64], 255);
        let TraceEvent::Dump { lines, .. } = &sink.events()[0] else {
            panic!("expected a dump");
        };
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].chars().next(), Some(' '));
        assert_eq!(lines[0].chars().nth(1), Some('@'));
    }

    #[test]
    fn overlays_record_in_order() {
        let mut sink = TraceSink::enabled();
        sink.points("plate sites", vec![(3, 4), (9, 1)]);
        sink.segments(
            "plate motion",
            vec![Segment { from: (3.0, 4.0), to: (5.0, 4.0) }],
        );
        assert_eq!(sink.len(), 2);
        assert!(matches!(
            &sink.events()[0],
            TraceEvent::Points { label, points } if label == "plate sites" && points.len() == 2
        ));
        assert!(matches!(
            &sink.events()[1],
            TraceEvent::Segments { segments, .. } if segments.len() == 1
        ));
    }

    #[test]
    fn signed_dump_normalizes_to_own_range() {
        let mut sink = TraceSink::enabled();
        sink.dump_signed("elevation", 3, &[-100, 0, 900, -100, 400, 900]);
        let TraceEvent::Dump { lines, .. } = &sink.events()[0] else {
            panic!("expected a dump");
        };
        assert_eq!(lines[0].chars().next(), Some(' '));
        assert_eq!(lines[0].chars().nth(2), Some('@'));
    }
}
