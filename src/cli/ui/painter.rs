use owo_colors::{OwoColorize, Style as OwoStyle};

use crate::session::UploadStatus;

/// Terminal styling for command output; plain text when colour is off.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    pub(crate) fn heading<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().cyan())
    }

    pub(crate) fn success<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().green())
    }

    pub(crate) fn failure<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().red())
    }

    pub(crate) fn muted<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().dimmed())
    }

    pub(crate) fn value<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold())
    }

    /// Renders the modal text for an upload status, marked by outcome.
    pub(crate) fn upload_status(&self, status: UploadStatus) -> String {
        let text = status.message().unwrap_or("idle");
        match status {
            UploadStatus::Succeeded => self.success(format!("✓ {text}")),
            UploadStatus::Failed => self.failure(format!("✗ {text}")),
            UploadStatus::Pending => self.value(text),
            UploadStatus::Idle => self.muted(text),
        }
    }

    fn paint(&self, text: &str, style: OwoStyle) -> String {
        if self.use_colour {
            format!("{}", text.style(style))
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::succeeded(UploadStatus::Succeeded, "✓ upload complete")]
    #[case::failed(UploadStatus::Failed, "✗ upload failed")]
    #[case::pending(UploadStatus::Pending, "uploading…")]
    #[case::idle(UploadStatus::Idle, "idle")]
    fn plain_status_text(#[case] status: UploadStatus, #[case] expected: &str) {
        assert_eq!(expected, Painter::new(false).upload_status(status));
    }

    #[test]
    fn colour_wraps_text_in_escape_codes() {
        let painter = Painter::new(true);
        let styled = painter.heading("CONFIG");
        assert_ne!("CONFIG", styled);
        assert!(styled.contains("CONFIG"));
        assert!(styled.starts_with('\u{1b}'));
    }
}
