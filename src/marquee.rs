/// Visible characters on a key face.
pub const WINDOW: usize = 7;

// spaces appended before the text wraps back around
const GAP: usize = 5;

/// Horizontal scroller over a fixed-width window.
///
/// Text longer than [`WINDOW`] is padded with a gap and treated as a ring:
/// each call to [`Marquee::advance`] shows the window at the current offset
/// and moves the offset one character forward, wrapping after the padded
/// length. Shorter text is shown as-is and never moves.
#[derive(Debug, Clone, Default)]
pub struct Marquee {
    chars: Vec<char>,
    offset: usize,
    scrolling: bool,
}

impl Marquee {
    pub fn new(text: &str) -> Self {
        let mut chars: Vec<char> = text.chars().collect();
        let scrolling = chars.len() > WINDOW;
        if scrolling {
            chars.extend(std::iter::repeat(' ').take(GAP));
        }
        Self { chars, offset: 0, scrolling }
    }

    pub fn is_scrolling(&self) -> bool {
        self.scrolling
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the scrolled ring (text plus gap).
    pub fn padded_len(&self) -> usize {
        self.chars.len()
    }

    /// Window at the current offset, without moving.
    pub fn frame(&self) -> String {
        if !self.scrolling {
            return self.chars.iter().collect();
        }
        let len = self.chars.len();
        (0..WINDOW).map(|i| self.chars[(self.offset + i) % len]).collect()
    }

    /// Current window, then step the offset.
    pub fn advance(&mut self) -> String {
        let frame = self.frame();
        if self.scrolling {
            self.offset = (self.offset + 1) % self.chars.len();
        }
        frame
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_wrap_after_padded_length() {
        let mut m = Marquee::new("Aphex Twin - Windowlicker");
        let len = m.padded_len();
        assert_eq!(len, "Aphex Twin - Windowlicker".chars().count() + GAP);

        let first = m.frame();
        let mut seen = Vec::new();
        for _ in 0..len {
            seen.push(m.offset());
            m.advance();
        }
        assert_eq!(seen, (0..len).collect::<Vec<_>>());
        assert_eq!(m.offset(), 0);
        assert_eq!(m.frame(), first);
    }

    #[test]
    fn window_spans_the_gap() {
        let mut m = Marquee::new("ABCDEFGH");
        for _ in 0..6 {
            m.advance();
        }
        // offset 6: "GH" then five gap spaces
        assert_eq!(m.frame(), "GH     ");
        m.advance();
        m.advance();
        m.advance();
        assert_eq!(m.frame(), "    ABC");
        assert!(m.frame().chars().count() == WINDOW);
    }

    #[test]
    fn short_text_is_static() {
        let mut m = Marquee::new("A - B");
        for _ in 0..20 {
            assert_eq!(m.advance(), "A - B");
            assert_eq!(m.offset(), 0);
        }
        let mut exact = Marquee::new("1234567");
        assert!(!exact.is_scrolling());
        assert_eq!(exact.advance(), "1234567");
    }

    #[test]
    fn counts_characters_not_bytes() {
        let mut m = Marquee::new("Björk - Jóga Ísland");
        let len = m.padded_len();
        for _ in 0..len * 2 {
            assert_eq!(m.advance().chars().count(), WINDOW);
        }
    }
}
