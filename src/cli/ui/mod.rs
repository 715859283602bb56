mod painter;
mod snapshot_view;

pub(crate) use self::painter::Painter;
pub(crate) use self::snapshot_view::{FrameView, SnapshotView};
