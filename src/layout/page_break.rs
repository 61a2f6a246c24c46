//! # Page Break Decisions
//!
//! Where a paragraph's lines go when the page is nearly full. A paragraph is
//! a list of line heights; a keep-together section (header, signature block)
//! is one unbreakable item.

/// Slack for accumulated floating-point error in summed heights.
const TOLERANCE: f64 = 1e-6;

/// What to do with a run of lines at the current cursor position.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakDecision {
    /// Everything fits on the current page.
    Place,
    /// Start the whole run on the next page.
    MoveToNextPage,
    /// Put the first `items_on_current_page` lines here, the rest on the next page.
    Split { items_on_current_page: usize },
}

/// Decide how `item_heights` should be placed given `remaining_height`.
///
/// Widow/orphan control: never leave fewer than `min_orphan_lines` at the
/// bottom of a page, nor fewer than `min_widow_lines` at the top of the next.
pub fn decide_break(
    remaining_height: f64,
    item_heights: &[f64],
    is_breakable: bool,
    min_orphan_lines: usize,
    min_widow_lines: usize,
) -> BreakDecision {
    let limit = remaining_height + TOLERANCE;
    if item_heights.iter().sum::<f64>() <= limit {
        return BreakDecision::Place;
    }
    if !is_breakable {
        return BreakDecision::MoveToNextPage;
    }

    let fitting = item_heights
        .iter()
        .scan(0.0, |used, &h| {
            *used += h;
            Some(*used)
        })
        .take_while(|&used| used <= limit)
        .count();

    // Hold back enough lines for the next page, then check what is left here.
    let keep = fitting.min(item_heights.len().saturating_sub(min_widow_lines));
    if keep == 0 || keep < min_orphan_lines {
        BreakDecision::MoveToNextPage
    } else {
        BreakDecision::Split {
            items_on_current_page: keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: f64 = 7.0;

    fn lines(n: usize) -> Vec<f64> {
        vec![LINE; n]
    }

    #[test]
    fn short_paragraph_fits() {
        assert_eq!(decide_break(30.0, &lines(4), true, 2, 2), BreakDecision::Place);
    }

    #[test]
    fn signature_block_moves_whole() {
        assert_eq!(
            decide_break(20.0, &[45.0], false, 2, 2),
            BreakDecision::MoveToNextPage
        );
    }

    #[test]
    fn long_paragraph_splits_at_page_bottom() {
        // 3 lines fit in 22mm, 5 carry over.
        assert_eq!(
            decide_break(22.0, &lines(8), true, 1, 1),
            BreakDecision::Split {
                items_on_current_page: 3
            }
        );
    }

    #[test]
    fn single_orphan_line_moves_paragraph() {
        assert_eq!(
            decide_break(10.0, &lines(5), true, 2, 2),
            BreakDecision::MoveToNextPage
        );
    }

    #[test]
    fn widow_pulls_a_line_back() {
        // 4 of 5 fit, leaving 1 widow (min 2): keep 3 here.
        assert_eq!(
            decide_break(29.0, &lines(5), true, 2, 2),
            BreakDecision::Split {
                items_on_current_page: 3
            }
        );
    }

    #[test]
    fn nothing_fits_moves() {
        assert_eq!(
            decide_break(3.0, &lines(4), true, 0, 0),
            BreakDecision::MoveToNextPage
        );
    }

    #[test]
    fn widow_adjustment_below_orphan_minimum_moves() {
        // 2 of 3 fit; pulling one back would leave a single orphan.
        assert_eq!(
            decide_break(15.0, &lines(3), true, 2, 2),
            BreakDecision::MoveToNextPage
        );
    }
}
