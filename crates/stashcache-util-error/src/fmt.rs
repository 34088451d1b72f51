use std::fmt;

/// Formats an error and its `source()` chain on a single line, e.g.
/// `upstream request failed: connection refused: os error 111`.
///
/// Useful in `tracing` fields where a full multi-line `{:?}` debug dump
/// would be noisy.
pub struct Compact<'e>(&'e (dyn std::error::Error + 'static));

impl fmt::Display for Compact<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut cur = self.0.source();
        while let Some(source) = cur {
            write!(f, ": {source}")?;
            cur = source.source();
        }
        Ok(())
    }
}

pub trait FmtCompact {
    fn fmt_compact(&self) -> Compact<'_>;
}

impl<E> FmtCompact for E
where
    E: std::error::Error + 'static,
{
    fn fmt_compact(&self) -> Compact<'_> {
        Compact(self)
    }
}
