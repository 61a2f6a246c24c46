//! Advance widths of the standard Type1 faces, in 1/1000 em.
//!
//! Only the printable ASCII range is tabulated. Accented Latin-1 letters fold
//! to their base letter, a few typographic punctuation marks have their own
//! entries, and anything else gets a default width.

/// Width table for one standard face.
#[derive(Debug)]
pub struct StandardFontMetrics {
    /// Widths for U+0020..=U+007E.
    ascii: [u16; 95],
    monospace: bool,
}

impl StandardFontMetrics {
    /// Advance width of `ch` in 1/1000 em.
    pub fn advance(&self, ch: char) -> u16 {
        if self.monospace {
            return 600;
        }
        if let Some(w) = self.ascii_width(ch) {
            return w;
        }
        if let Some(w) = fold_accent(ch).and_then(|base| self.ascii_width(base)) {
            return w;
        }
        match ch {
            '\u{00A0}' => 250,
            '«' | '»' | '–' | '§' | '€' | '†' | '‡' => 500,
            '—' | '…' | '‰' => 1000,
            '‘' | '’' | '‚' | '‹' | '›' => 333,
            '“' | '”' | '„' => 444,
            '•' => 350,
            '°' => 400,
            'ª' => 276,
            'º' => 310,
            '¹' | '²' | '³' => 300,
            '½' | '¼' | '¾' => 750,
            'Æ' => 889,
            'æ' => 667,
            'Œ' => 889,
            'œ' => 722,
            'ß' => 500,
            _ => 500,
        }
    }

    /// Width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        self.advance(ch) as f64 / 1000.0 * font_size
    }

    /// Width of a string in points.
    pub fn measure_string(&self, text: &str, font_size: f64) -> f64 {
        text.chars().map(|ch| self.char_width(ch, font_size)).sum()
    }

    fn ascii_width(&self, ch: char) -> Option<u16> {
        let cp = ch as u32;
        (0x20..=0x7E)
            .contains(&cp)
            .then(|| self.ascii[(cp - 0x20) as usize])
    }
}

/// Map an accented Latin letter to its unaccented base.
pub(crate) fn fold_accent(ch: char) -> Option<char> {
    let base = match ch {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'Ç' => 'C',
        'ç' => 'c',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'Ñ' => 'N',
        'ñ' => 'n',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => 'O',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'Ý' | 'Ÿ' => 'Y',
        'ý' | 'ÿ' => 'y',
        'Š' => 'S',
        'š' => 's',
        'Ž' => 'Z',
        'ž' => 'z',
        _ => return None,
    };
    Some(base)
}

#[rustfmt::skip]
pub static TIMES_ROMAN: StandardFontMetrics = StandardFontMetrics {
    ascii: [
        // space ! " # $ % & ' ( ) * + , - . /
        250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
        // 0-9
        500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
        // : ; < = > ? @
        278, 278, 564, 564, 564, 444, 921,
        // A-Z
        722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889,
        722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611,
        // [ \ ] ^ _ `
        333, 278, 333, 469, 500, 333,
        // a-z
        444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778,
        500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444,
        // { | } ~
        480, 200, 480, 541,
    ],
    monospace: false,
};

#[rustfmt::skip]
pub static TIMES_BOLD: StandardFontMetrics = StandardFontMetrics {
    ascii: [
        250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
        500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
        333, 333, 570, 570, 570, 500, 930,
        722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944,
        722, 778, 611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667,
        333, 278, 333, 581, 500, 333,
        500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833,
        556, 500, 556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444,
        394, 220, 394, 520,
    ],
    monospace: false,
};

#[rustfmt::skip]
pub static TIMES_ITALIC: StandardFontMetrics = StandardFontMetrics {
    ascii: [
        250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333, 250, 278,
        500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
        333, 333, 675, 675, 675, 500, 920,
        611, 611, 667, 722, 611, 611, 722, 722, 333, 444, 667, 556, 833,
        667, 722, 611, 722, 611, 500, 556, 722, 611, 833, 611, 556, 556,
        389, 278, 389, 422, 500, 333,
        500, 500, 444, 500, 444, 278, 500, 500, 278, 278, 444, 278, 722,
        500, 500, 500, 500, 389, 389, 278, 500, 444, 667, 444, 444, 389,
        400, 275, 400, 541,
    ],
    monospace: false,
};

#[rustfmt::skip]
pub static TIMES_BOLD_ITALIC: StandardFontMetrics = StandardFontMetrics {
    ascii: [
        250, 389, 555, 500, 500, 833, 778, 278, 333, 333, 500, 570, 250, 333, 250, 278,
        500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
        333, 333, 570, 570, 570, 500, 832,
        667, 667, 667, 722, 667, 667, 722, 778, 389, 500, 667, 611, 889,
        722, 722, 611, 722, 667, 556, 611, 722, 667, 889, 667, 611, 611,
        333, 278, 333, 570, 500, 333,
        500, 500, 444, 500, 444, 333, 500, 556, 278, 278, 500, 278, 778,
        556, 500, 500, 500, 389, 389, 278, 556, 444, 667, 500, 444, 389,
        348, 220, 348, 570,
    ],
    monospace: false,
};

/// All four Courier faces share one table.
pub static COURIER: StandardFontMetrics = StandardFontMetrics {
    ascii: [600; 95],
    monospace: true,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_times_space_width() {
        assert!((TIMES_ROMAN.char_width(' ', 12.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_bold_wider_than_regular() {
        assert!(TIMES_BOLD.advance('R') > TIMES_ROMAN.advance('R'));
        assert!(TIMES_BOLD.measure_string("Requerimento", 12.0)
            > TIMES_ROMAN.measure_string("Requerimento", 12.0));
    }

    #[test]
    fn test_accents_fold_to_base() {
        assert_eq!(TIMES_ROMAN.advance('ã'), TIMES_ROMAN.advance('a'));
        assert_eq!(TIMES_ROMAN.advance('Ç'), TIMES_ROMAN.advance('C'));
        assert_eq!(TIMES_ITALIC.advance('é'), TIMES_ITALIC.advance('e'));
    }

    #[test]
    fn test_courier_is_monospace() {
        assert_eq!(COURIER.advance('i'), COURIER.advance('W'));
        assert_eq!(COURIER.advance('ç'), 600);
    }

    #[test]
    fn test_typographic_punctuation() {
        assert_eq!(TIMES_ROMAN.advance('—'), 1000);
        assert_eq!(TIMES_ROMAN.advance('«'), 500);
    }
}
