use crate::common::*;

/// Shift the base anchors to the center of every grid cell.
///
/// Cell centers are `((row + 0.5) * stride, (col + 0.5) * stride)`. The
/// output holds `grid.h() * grid.w() * base_anchors.len()` boxes, ordered by
/// row, then column, then base anchor.
pub fn tile_anchors(
    grid: &HW<usize>,
    stride: f64,
    base_anchors: &[TLBR<f64>],
) -> Result<Vec<TLBR<f64>>> {
    ensure!(
        stride.is_finite() && stride > 0.0,
        "stride must be positive, but get {}",
        stride
    );

    let anchors = iproduct!(0..grid.h(), 0..grid.w(), base_anchors)
        .map(|(row, col, base)| {
            let cy = (row as f64 + 0.5) * stride;
            let cx = (col as f64 + 0.5) * stride;
            base.translate(cy, cx)
        })
        .collect();
    Ok(anchors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_order() {
        let base = vec![
            TLBR::from_tlbr([-1.0, -1.0, 1.0, 1.0]),
            TLBR::from_tlbr([-2.0, -1.0, 2.0, 1.0]),
        ];
        let anchors = tile_anchors(&HW::from_hw([2, 3]), 4.0, &base).unwrap();
        assert_eq!(anchors.len(), 12);

        // cell (0, 0)
        assert_eq!(anchors[0].tlbr(), [1.0, 1.0, 3.0, 3.0]);
        assert_eq!(anchors[1].tlbr(), [0.0, 1.0, 4.0, 3.0]);
        // cell (0, 1)
        assert_eq!(anchors[2].tlbr(), [1.0, 5.0, 3.0, 7.0]);
        // cell (1, 0)
        assert_eq!(anchors[6].tlbr(), [5.0, 1.0, 7.0, 3.0]);
        // cell (1, 2), second base anchor
        assert_eq!(anchors[11].tlbr(), [4.0, 9.0, 8.0, 11.0]);
    }

    #[test]
    fn tile_rejects_bad_stride() {
        let base = vec![TLBR::from_tlbr([-1.0, -1.0, 1.0, 1.0])];
        assert!(tile_anchors(&HW::from_hw([2, 2]), 0.0, &base).is_err());
        assert!(tile_anchors(&HW::from_hw([2, 2]), -4.0, &base).is_err());
    }
}
