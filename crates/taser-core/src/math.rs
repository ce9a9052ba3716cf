use nalgebra::{DVector, Matrix3, Point3, UnitQuaternion, Vector2, Vector3};

pub type Real = f64;

pub type Vec2 = Vector2<Real>;
pub type Vec3 = Vector3<Real>;
pub type Pt3 = Point3<Real>;
pub type Mat3 = Matrix3<Real>;
pub type Quat = UnitQuaternion<Real>;

/// Largest absolute entry of a vector, `0.0` for an empty one.
pub fn max_abs(v: &DVector<Real>) -> Real {
    v.iter().fold(0.0, |acc: Real, x| acc.max(x.abs()))
}

/// Returns `true` if every entry is finite.
pub fn all_finite(v: &DVector<Real>) -> bool {
    v.iter().all(|x| x.is_finite())
}
