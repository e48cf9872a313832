use super::AreaConvention;
use crate::common::*;

/// The generic rectangle.
pub trait Rect {
    type Type;

    fn t(&self) -> Self::Type;
    fn l(&self) -> Self::Type;
    fn b(&self) -> Self::Type;
    fn r(&self) -> Self::Type;
    fn cy(&self) -> Self::Type;
    fn cx(&self) -> Self::Type;
    fn h(&self) -> Self::Type;
    fn w(&self) -> Self::Type;

    fn try_from_tlbr(tlbr: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_tlhw(tlhw: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_cycxhw(cycxhw: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;
}

pub trait RectNum: Rect
where
    Self::Type: Num + PartialOrd,
{
    fn from_tlbr(tlbr: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_tlbr(tlbr).unwrap()
    }

    fn from_cycxhw(cycxhw: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_cycxhw(cycxhw).unwrap()
    }

    fn tlbr(&self) -> [Self::Type; 4] {
        [self.t(), self.l(), self.b(), self.r()]
    }

    fn hw(&self) -> [Self::Type; 2] {
        [self.h(), self.w()]
    }

    fn area(&self) -> <Self::Type as Mul<Self::Type>>::Output
    where
        Self::Type: Mul<Self::Type>,
    {
        self.h() * self.w()
    }
}

pub trait RectFloat: RectNum
where
    Self::Type: Float,
{
    /// Box height under the area convention.
    fn h_with(&self, convention: AreaConvention) -> Self::Type {
        convention.extent(self.t(), self.b())
    }

    /// Box width under the area convention.
    fn w_with(&self, convention: AreaConvention) -> Self::Type {
        convention.extent(self.l(), self.r())
    }

    /// Box center `[cy, cx]` under the area convention.
    fn center_with(&self, convention: AreaConvention) -> [Self::Type; 2] {
        [
            convention.center(self.t(), self.b()),
            convention.center(self.l(), self.r()),
        ]
    }

    fn area_with(&self, convention: AreaConvention) -> Self::Type {
        self.h_with(convention) * self.w_with(convention)
    }

    /// Compute the overlapping area. Disjoint boxes yield zero.
    fn intersection_area_with<R>(&self, other: &R, convention: AreaConvention) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let zero = Self::Type::zero();
        let t = self.t().max(other.t());
        let l = self.l().max(other.l());
        let b = self.b().min(other.b());
        let r = self.r().min(other.r());
        let h = convention.extent(t, b).max(zero);
        let w = convention.extent(l, r).max(zero);
        h * w
    }

    /// Compute the intersection over union.
    ///
    /// The union is clamped to `epsilon` from below, so degenerate boxes
    /// produce zero instead of NaN.
    fn iou_with<R>(&self, other: &R, convention: AreaConvention, epsilon: Self::Type) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let inter_area = self.intersection_area_with(other, convention);
        let union_area = (self.area_with(convention) + other.area_with(convention) - inter_area)
            .max(epsilon);
        inter_area / union_area
    }
}

impl<T> RectNum for T
where
    T: Rect,
    T::Type: Num + PartialOrd,
{
}

impl<T> RectFloat for T
where
    T: Rect,
    T::Type: Float,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TLBR;
    use approx::assert_abs_diff_eq;

    #[test]
    fn iou_identical_and_disjoint() {
        let lhs = TLBR::from_tlbr([10.0, 10.0, 20.0, 20.0]);
        let rhs = TLBR::from_tlbr([30.0, 30.0, 40.0, 40.0]);
        assert_abs_diff_eq!(lhs.iou_with(&lhs, AreaConvention::Continuous, f64::EPSILON), 1.0);
        assert_abs_diff_eq!(lhs.iou_with(&rhs, AreaConvention::Continuous, f64::EPSILON), 0.0);
    }

    #[test]
    fn iou_half_overlap() {
        let lhs = TLBR::from_tlbr([0.0, 0.0, 10.0, 10.0]);
        let rhs = TLBR::from_tlbr([0.0, 5.0, 10.0, 15.0]);
        let iou = lhs.iou_with(&rhs, AreaConvention::Continuous, f64::EPSILON);
        assert_abs_diff_eq!(iou, 50.0 / 150.0, epsilon = 1e-12);
    }

    #[test]
    fn iou_pixel_inclusive_touching_boxes() {
        // boxes sharing one pixel row overlap under the pixel convention only
        let lhs = TLBR::from_tlbr([0.0, 0.0, 9.0, 9.0]);
        let rhs = TLBR::from_tlbr([9.0, 0.0, 18.0, 9.0]);
        let continuous = lhs.iou_with(&rhs, AreaConvention::Continuous, f64::EPSILON);
        let pixel = lhs.iou_with(&rhs, AreaConvention::PixelInclusive, f64::EPSILON);
        assert_abs_diff_eq!(continuous, 0.0);
        assert_abs_diff_eq!(pixel, 10.0 / 190.0, epsilon = 1e-12);
    }

    #[test]
    fn iou_degenerate_boxes() {
        let point = TLBR::from_tlbr([5.0, 5.0, 5.0, 5.0]);
        let iou = point.iou_with(&point, AreaConvention::Continuous, f64::EPSILON);
        assert!(iou.is_finite());
        assert_abs_diff_eq!(iou, 0.0);
    }
}
