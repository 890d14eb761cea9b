use facet_geom::Vec2;
use proptest::num::f32::NORMAL;
use proptest::prelude::*;
use proptest::strategy::Strategy;

fn approx_abs_rel(a: f32, b: f32, atol: f32, rtol: f32) -> bool {
    let diff = (a - b).abs();
    let scale = a.abs().max(b.abs());
    diff <= atol + rtol * scale
}

fn bounded_f32() -> impl Strategy<Value = f32> {
    NORMAL.prop_filter("bounded", |v| v.is_finite() && v.abs() <= 1e4)
}

fn arb_vec2() -> impl Strategy<Value = Vec2> {
    (bounded_f32(), bounded_f32()).prop_map(|(x, y)| Vec2::new(x, y))
}

proptest! {
    // Cross product is antisymmetric: a×b = -(b×a)
    #[test]
    fn vec2_cross_antisymmetric(a in arb_vec2(), b in arb_vec2()) {
        let scale = a.length() * b.length();
        prop_assert!(approx_abs_rel(a.cross(b), -b.cross(a), 1e-6, 1e-5 * (1.0 + scale)));
    }

    // The perpendicular is orthogonal and keeps the length
    #[test]
    fn vec2_perp_orthogonal(a in arb_vec2()) {
        let p = a.perp();
        prop_assert!(a.dot(p).abs() <= 1e-5 * (1.0 + a.length_squared()));
        prop_assert!(approx_abs_rel(p.length(), a.length(), 1e-6, 1e-5));
    }

    // Rotating left by perp gives a positive cross
    #[test]
    fn vec2_perp_turns_left(a in arb_vec2()) {
        prop_assume!(a.length() > 1e-3);
        prop_assert!(a.cross(a.perp()) > 0.0);
    }

    // Normalized non-zero vectors have unit length
    #[test]
    fn vec2_normalized_unit(a in arb_vec2()) {
        prop_assume!(a.length() > 1e-3);
        prop_assert!(approx_abs_rel(a.normalized().length(), 1.0, 1e-5, 1e-5));
    }

    // Sweep order is a strict order: never both a<b and b<a
    #[test]
    fn vec2_sweep_less_asymmetric(a in arb_vec2(), b in arb_vec2()) {
        prop_assert!(!(a.sweep_less(b) && b.sweep_less(a)));
        if a != b {
            prop_assert!(a.sweep_less(b) || b.sweep_less(a));
        }
    }
}
