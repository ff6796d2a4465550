use std::collections::VecDeque;

pub const MAX_CONSOLE_LINES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Error,
    Warn,
    Wifi,
    Ws,
    Ota,
    Calibration,
    Control,
    Plain,
}

impl LineKind {
    /// Device log lines look like `[00:01:02] [WIFI] text`; the second
    /// bracketed tag decides the kind.
    pub fn classify(line: &str) -> Self {
        let Some(tag) = second_tag(line) else {
            return LineKind::Plain;
        };
        match tag.to_ascii_lowercase().as_str() {
            "error" | "err" => LineKind::Error,
            "warn" | "warning" => LineKind::Warn,
            "wifi" => LineKind::Wifi,
            "ws" => LineKind::Ws,
            "ota" => LineKind::Ota,
            "calibration" | "cal" => LineKind::Calibration,
            "control" => LineKind::Control,
            _ => LineKind::Plain,
        }
    }
}

fn second_tag(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('[')?;
    let (_, rest) = rest.split_once(']')?;
    let rest = rest.trim_start().strip_prefix('[')?;
    let (tag, _) = rest.split_once(']')?;
    Some(tag.trim())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub text: String,
    pub kind: LineKind,
}

/// Device log lines, oldest first, bounded to [`MAX_CONSOLE_LINES`].
#[derive(Debug)]
pub struct Console {
    lines: VecDeque<ConsoleLine>,
    capacity: usize,
}

impl Default for Console {
    fn default() -> Self {
        Self::with_capacity(MAX_CONSOLE_LINES)
    }
}

impl Console {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(MAX_CONSOLE_LINES)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, text: impl Into<String>) {
        let text = text.into();
        let kind = LineKind::classify(&text);
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(ConsoleLine { text, kind });
    }

    /// `logHistory` replaces whatever was shown.
    pub fn replace(&mut self, lines: impl IntoIterator<Item = String>) {
        self.lines.clear();
        for line in lines {
            self.push(line);
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = &ConsoleLine> {
        self.lines.iter()
    }
}
