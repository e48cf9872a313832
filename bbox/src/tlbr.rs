use super::Rect;
use crate::common::*;

/// Bounding box in TLBR format, i.e. `(y1, x1, y2, x2)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[T; 4]", into = "[T; 4]")]
#[serde(bound(
    serialize = "T: Copy + Num + PartialOrd + Serialize",
    deserialize = "T: Copy + Num + PartialOrd + Deserialize<'de>"
))]
pub struct TLBR<T> {
    pub(crate) t: T,
    pub(crate) l: T,
    pub(crate) b: T,
    pub(crate) r: T,
}

impl<T> TLBR<T>
where
    T: Copy + Num,
{
    /// Shift the box by `dy` rows and `dx` columns.
    pub fn translate(&self, dy: T, dx: T) -> Self {
        TLBR {
            t: self.t + dy,
            l: self.l + dx,
            b: self.b + dy,
            r: self.r + dx,
        }
    }
}

impl<T> Rect for TLBR<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn t(&self) -> Self::Type {
        self.t
    }

    fn l(&self) -> Self::Type {
        self.l
    }

    fn b(&self) -> Self::Type {
        self.b
    }

    fn r(&self) -> Self::Type {
        self.r
    }

    fn cy(&self) -> Self::Type {
        let one = T::one();
        let two = one + one;
        self.t + self.h() / two
    }

    fn cx(&self) -> Self::Type {
        let one = T::one();
        let two = one + one;
        self.l + self.w() / two
    }

    fn h(&self) -> Self::Type {
        self.b - self.t
    }

    fn w(&self) -> Self::Type {
        self.r - self.l
    }

    fn try_from_cycxhw(cycxhw: [Self::Type; 4]) -> Result<Self> {
        let [cy, cx, h, w] = cycxhw;
        let zero = T::zero();
        ensure!(h >= zero && w >= zero, "h and w must be non-negative");

        let two = T::one() + T::one();
        let t = cy - h / two;
        let b = cy + h / two;
        let l = cx - w / two;
        let r = cx + w / two;

        Ok(Self { t, l, b, r })
    }

    fn try_from_tlbr(tlbr: [Self::Type; 4]) -> Result<Self> {
        let [t, l, b, r] = tlbr;
        ensure!(b >= t && r >= l, "b >= t and r >= l must hold");

        Ok(Self { t, l, b, r })
    }

    fn try_from_tlhw(tlhw: [Self::Type; 4]) -> Result<Self> {
        let [t, l, h, w] = tlhw;
        let b = t + h;
        let r = l + w;
        Self::try_from_tlbr([t, l, b, r])
    }
}

impl<T> TryFrom<[T; 4]> for TLBR<T>
where
    T: Copy + Num + PartialOrd,
{
    type Error = anyhow::Error;

    fn try_from(tlbr: [T; 4]) -> Result<Self, Self::Error> {
        Self::try_from_tlbr(tlbr)
    }
}

impl<T> From<TLBR<T>> for [T; 4] {
    fn from(from: TLBR<T>) -> Self {
        let TLBR { t, l, b, r } = from;
        [t, l, b, r]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;

    #[test]
    fn tlbr_rejects_inverted_box() {
        assert!(TLBR::try_from_tlbr([10.0, 0.0, 5.0, 4.0]).is_err());
        assert!(TLBR::try_from_tlbr([0.0, 0.0, f64::NAN, 4.0]).is_err());
        assert!(TLBR::try_from_tlbr([3.0, 3.0, 3.0, 3.0]).is_ok());
    }

    #[test]
    fn tlbr_translate() {
        let rect = TLBR::from_tlbr([-1.0, -2.0, 1.0, 2.0]).translate(4.0, 8.0);
        assert_eq!(rect.tlbr(), [3.0, 6.0, 5.0, 10.0]);
    }
}
