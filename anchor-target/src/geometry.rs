//! Pairwise box geometry over box sets.

use crate::common::*;

/// The lower bound of the IoU denominator.
pub const IOU_EPSILON: f64 = f64::EPSILON;

/// Compute the pairwise IoU matrix in shape `[lhs.len(), rhs.len()]`.
///
/// Values lie in `[0, 1]`. Disjoint and zero-area boxes yield zero.
pub fn compute_iou<A, B>(lhs: &[A], rhs: &[B], area: AreaConvention) -> Array2<f64>
where
    A: Rect<Type = f64>,
    B: Rect<Type = f64>,
{
    Array2::from_shape_fn((lhs.len(), rhs.len()), |(row, col)| {
        lhs[row].iou_with(&rhs[col], area, IOU_EPSILON)
    })
}

/// Compute box centers `(cy, cx)` in shape `[boxes.len(), 2]`.
pub fn box_centers<R>(boxes: &[R], area: AreaConvention) -> Array2<f64>
where
    R: Rect<Type = f64>,
{
    let mut centers = Array2::zeros((boxes.len(), 2));
    centers
        .outer_iter_mut()
        .zip(boxes)
        .for_each(|(mut row, rect)| {
            let [cy, cx] = rect.center_with(area);
            row[0] = cy;
            row[1] = cx;
        });
    centers
}

/// Encode the ground truth box against the anchor into normalized
/// `(dy, dx, dh, dw)`.
pub fn encode_regression_target<A, G>(coder: &BoxCoder, anchor: &A, gt: &G) -> [f64; 4]
where
    A: Rect<Type = f64>,
    G: Rect<Type = f64>,
{
    coder.encode(anchor, gt)
}

/// Encode pairs of anchors and ground truth boxes into a `[n, 4]` array.
pub fn encode_regression_targets<A, G>(
    coder: &BoxCoder,
    anchors: &[A],
    gts: &[G],
) -> Result<Array2<f64>>
where
    A: Rect<Type = f64>,
    G: Rect<Type = f64>,
{
    ensure!(
        anchors.len() == gts.len(),
        "the number of anchors ({}) and ground truth boxes ({}) mismatch",
        anchors.len(),
        gts.len()
    );

    let mut deltas = Array2::zeros((anchors.len(), 4));
    izip!(deltas.outer_iter_mut(), anchors, gts).for_each(|(mut row, anchor, gt)| {
        let encoded = coder.encode(anchor, gt);
        row.iter_mut()
            .zip(encoded)
            .for_each(|(dst, src)| *dst = src);
    });
    Ok(deltas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn boxes() -> Vec<TLBR<f64>> {
        vec![
            TLBR::from_tlbr([10.0, 10.0, 20.0, 20.0]),
            TLBR::from_tlbr([15.0, 12.0, 30.0, 25.0]),
            TLBR::from_tlbr([0.0, 0.0, 5.0, 5.0]),
            TLBR::from_tlbr([7.0, 7.0, 7.0, 7.0]),
        ]
    }

    #[test]
    fn iou_matrix_is_symmetric() {
        let lhs = boxes();
        let rhs: Vec<_> = boxes().into_iter().rev().collect();
        for area in [AreaConvention::Continuous, AreaConvention::PixelInclusive] {
            let forward = compute_iou(&lhs, &rhs, area);
            let backward = compute_iou(&rhs, &lhs, area);
            assert_eq!(forward.shape(), &[4, 4]);
            assert_eq!(forward, backward.t());
            assert!(forward
                .iter()
                .all(|iou| iou.is_finite() && (0.0..=1.0).contains(iou)));
        }
    }

    #[test]
    fn iou_matrix_diagonal() {
        let rects = boxes();
        let iou = compute_iou(&rects, &rects, AreaConvention::Continuous);
        (0..3).for_each(|index| assert_abs_diff_eq!(iou[[index, index]], 1.0));
        // zero-area box overlaps nothing, not even itself
        assert_abs_diff_eq!(iou[[3, 3]], 0.0);
    }

    #[test]
    fn iou_matrix_empty_side() {
        let rects = boxes();
        let empty: Vec<TLBR<f64>> = vec![];
        assert_eq!(
            compute_iou(&rects, &empty, AreaConvention::Continuous).shape(),
            &[4, 0]
        );
        assert_eq!(
            compute_iou(&empty, &rects, AreaConvention::Continuous).shape(),
            &[0, 4]
        );
    }

    #[test]
    fn centers() {
        let centers = box_centers(&boxes()[..1], AreaConvention::Continuous);
        assert_abs_diff_eq!(centers[[0, 0]], 15.0);
        assert_abs_diff_eq!(centers[[0, 1]], 15.0);
        let centers = box_centers(&boxes()[..1], AreaConvention::PixelInclusive);
        assert_abs_diff_eq!(centers[[0, 0]], 15.5);
    }

    #[test]
    fn encode_pairs() {
        let coder = BoxCoderInit::default().build().unwrap();
        let rects = boxes();
        let deltas = encode_regression_targets(&coder, &rects[..2], &rects[..2]).unwrap();
        assert_eq!(deltas.shape(), &[2, 4]);
        deltas.iter().for_each(|delta| assert_abs_diff_eq!(*delta, 0.0));
        assert!(encode_regression_targets(&coder, &rects[..2], &rects[..1]).is_err());
    }
}
