use super::{AreaConvention, Rect, RectFloat, RectNum, TLBR};
use crate::common::*;

/// The lower bound of box extents in the encoding, which keeps the division
/// and the logarithm finite for degenerate boxes.
const EXTENT_EPSILON: f64 = 1e-8;

/// The default normalization of `(dy, dx, dh, dw)` deltas.
pub const DEFAULT_DELTA_STD: [f64; 4] = [0.1, 0.1, 0.2, 0.2];

#[derive(Debug, Clone, PartialEq)]
pub struct BoxCoderInit {
    pub mean: Option<[f64; 4]>,
    pub std: Option<[f64; 4]>,
    pub area: AreaConvention,
}

impl BoxCoderInit {
    pub fn build(self) -> Result<BoxCoder> {
        let Self { mean, std, area } = self;
        let mean = mean.unwrap_or([0.0; 4]);
        let std = std.unwrap_or(DEFAULT_DELTA_STD);

        ensure!(
            mean.iter().all(|val| val.is_finite()),
            "delta mean must be finite"
        );
        ensure!(
            std.iter().all(|val| val.is_finite() && *val > 0.0),
            "delta std must be positive"
        );

        Ok(BoxCoder { mean, std, area })
    }
}

impl Default for BoxCoderInit {
    fn default() -> Self {
        Self {
            mean: None,
            std: None,
            area: AreaConvention::Continuous,
        }
    }
}

/// Encodes a target box relative to a reference box into normalized
/// `(dy, dx, dh, dw)` deltas, and decodes them back.
///
/// `dy` and `dx` are center offsets divided by the reference height and
/// width. `dh` and `dw` are log ratios of the sizes. The raw deltas are then
/// normalized by `(delta - mean) / std`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxCoder {
    mean: [f64; 4],
    std: [f64; 4],
    area: AreaConvention,
}

impl BoxCoder {
    pub fn mean(&self) -> [f64; 4] {
        self.mean
    }

    pub fn std(&self) -> [f64; 4] {
        self.std
    }

    pub fn area(&self) -> AreaConvention {
        self.area
    }

    /// Encode the target box relative to the reference box.
    pub fn encode<A, G>(&self, reference: &A, target: &G) -> [f64; 4]
    where
        A: Rect<Type = f64>,
        G: Rect<Type = f64>,
    {
        let area = self.area;
        let ref_h = reference.h_with(area).max(EXTENT_EPSILON);
        let ref_w = reference.w_with(area).max(EXTENT_EPSILON);
        let [ref_cy, ref_cx] = reference.center_with(area);

        let tgt_h = target.h_with(area).max(EXTENT_EPSILON);
        let tgt_w = target.w_with(area).max(EXTENT_EPSILON);
        let [tgt_cy, tgt_cx] = target.center_with(area);

        let raw = [
            (tgt_cy - ref_cy) / ref_h,
            (tgt_cx - ref_cx) / ref_w,
            (tgt_h / ref_h).ln(),
            (tgt_w / ref_w).ln(),
        ];

        let mut deltas = [0.0; 4];
        deltas
            .iter_mut()
            .zip(raw)
            .zip(self.mean.iter().zip(self.std.iter()))
            .for_each(|((delta, raw), (mean, std))| *delta = (raw - mean) / std);
        deltas
    }

    /// Apply the normalized deltas to the reference box.
    pub fn decode<A>(&self, reference: &A, deltas: [f64; 4]) -> Result<TLBR<f64>>
    where
        A: Rect<Type = f64>,
    {
        let area = self.area;
        let [dy, dx, dh, dw] = {
            let mut raw = [0.0; 4];
            raw.iter_mut()
                .zip(deltas)
                .zip(self.mean.iter().zip(self.std.iter()))
                .for_each(|((raw, delta), (mean, std))| *raw = delta * std + mean);
            raw
        };
        ensure!(
            [dy, dx, dh, dw].iter().all(|val| val.is_finite()),
            "deltas must be finite"
        );

        let ref_h = reference.h_with(area);
        let ref_w = reference.w_with(area);
        let [ref_cy, ref_cx] = reference.center_with(area);

        let cy = ref_cy + dy * ref_h;
        let cx = ref_cx + dx * ref_w;
        let h = ref_h * dh.exp();
        let w = ref_w * dw.exp();

        let t = cy - h / 2.0;
        let l = cx - w / 2.0;
        let b = area.upper(t, h);
        let r = area.upper(l, w);
        TLBR::try_from_tlbr([t, l, b, r])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn encode_identical_boxes() {
        let coder = BoxCoderInit::default().build().unwrap();
        let rect = TLBR::from_tlbr([10.0, 10.0, 20.0, 20.0]);
        let deltas = coder.encode(&rect, &rect);
        deltas.iter().for_each(|delta| assert_abs_diff_eq!(*delta, 0.0));
    }

    #[test]
    fn encode_normalized_offsets() {
        let coder = BoxCoderInit::default().build().unwrap();
        let anchor = TLBR::from_tlbr([0.0, 0.0, 10.0, 20.0]);
        let target = TLBR::from_tlbr([1.0, 2.0, 21.0, 22.0]);
        let [dy, dx, dh, dw] = coder.encode(&anchor, &target);

        // centers (5, 10) -> (11, 12), sizes (10, 20) -> (20, 20)
        assert_abs_diff_eq!(dy, 0.6 / 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(dx, 0.1 / 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(dh, 2f64.ln() / 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(dw, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn decode_inverts_encode() {
        for area in [AreaConvention::Continuous, AreaConvention::PixelInclusive] {
            let coder = BoxCoderInit {
                mean: Some([0.1, -0.1, 0.0, 0.05]),
                area,
                ..Default::default()
            }
            .build()
            .unwrap();
            let anchor = TLBR::from_tlbr([-8.0, 4.0, 24.0, 20.0]);
            let target = TLBR::from_tlbr([3.0, 1.0, 17.0, 40.0]);
            let decoded = coder.decode(&anchor, coder.encode(&anchor, &target)).unwrap();
            decoded
                .tlbr()
                .iter()
                .zip(target.tlbr())
                .for_each(|(lhs, rhs)| assert_abs_diff_eq!(*lhs, rhs, epsilon = 1e-9));
        }
    }

    #[test]
    fn encode_degenerate_target_is_finite() {
        let coder = BoxCoderInit::default().build().unwrap();
        let anchor = TLBR::from_tlbr([0.0, 0.0, 10.0, 10.0]);
        let target = TLBR::from_tlbr([5.0, 5.0, 5.0, 9.0]);
        assert!(coder
            .encode(&anchor, &target)
            .iter()
            .all(|delta| delta.is_finite()));
    }

    #[test]
    fn reject_non_positive_std() {
        let init = BoxCoderInit {
            std: Some([0.1, 0.0, 0.2, 0.2]),
            ..Default::default()
        };
        assert!(init.build().is_err());
    }
}
