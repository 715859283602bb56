use std::fmt::{self, Display, Formatter};

use tabled::builder::Builder;
use tabled::settings::Style as TableStyle;

use crate::config::{ConfigSnapshot, field_layout};

use super::painter::Painter;

/// Renders every configuration field as a table in wire order.
pub(crate) struct SnapshotView<'a> {
    snapshot: &'a ConfigSnapshot,
    painter: &'a Painter,
}

impl<'a> SnapshotView<'a> {
    pub(crate) fn new(snapshot: &'a ConfigSnapshot, painter: &'a Painter) -> Self {
        Self { snapshot, painter }
    }
}

impl Display for SnapshotView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();
        builder.push_record(["field", "kind", "offset", "value"]);
        for spec in field_layout() {
            let value = self
                .snapshot
                .get(spec.id())
                .map_or_else(|error| self.painter.failure(error.to_string()), |value| {
                    self.painter.value(value.to_string())
                });
            builder.push_record([
                self.painter.muted(spec.id().to_string()),
                spec.kind().to_string(),
                spec.offset().to_string(),
                value,
            ]);
        }
        let mut table = builder.build();
        table.with(TableStyle::rounded());
        write!(f, "{table}")
    }
}

/// Renders a frame as its hex bytes under a heading.
pub(crate) struct FrameView<'a> {
    title: &'a str,
    hex: &'a str,
    len: usize,
    painter: &'a Painter,
}

impl<'a> FrameView<'a> {
    pub(crate) fn new(title: &'a str, hex: &'a str, len: usize, painter: &'a Painter) -> Self {
        Self {
            title,
            hex,
            len,
            painter,
        }
    }
}

impl Display for FrameView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {}",
            self.painter.heading(self.title),
            self.painter.muted(format!("({} bytes)", self.len))
        )?;
        write!(f, "{}", self.hex)
    }
}
