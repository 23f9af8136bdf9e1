//! 4-wide float SIMD abstraction.
//!
//! The rasterizer's varying interpolation runs one `Simd4` lane set per
//! varying slot. SSE2 and NEON backends cover the common targets; the
//! scalar fallback keeps every other architecture correct.

use crate::math::Vec4;

#[cfg(target_arch = "x86_64")]
mod imp {
    use std::arch::x86_64::*;

    #[derive(Copy, Clone)]
    pub struct Simd4(__m128);

    impl Simd4 {
        #[inline]
        pub fn splat(v: f32) -> Simd4 {
            Simd4(unsafe { _mm_set1_ps(v) })
        }

        #[inline]
        pub fn load(a: [f32; 4]) -> Simd4 {
            Simd4(unsafe { _mm_loadu_ps(a.as_ptr()) })
        }

        #[inline]
        pub fn store(self) -> [f32; 4] {
            let mut out = [0.0f32; 4];
            unsafe { _mm_storeu_ps(out.as_mut_ptr(), self.0) };
            out
        }

        #[inline]
        pub fn add(self, o: Simd4) -> Simd4 {
            Simd4(unsafe { _mm_add_ps(self.0, o.0) })
        }

        #[inline]
        pub fn mul(self, o: Simd4) -> Simd4 {
            Simd4(unsafe { _mm_mul_ps(self.0, o.0) })
        }

        /// `self + a * b`.
        #[inline]
        pub fn madd(self, a: Simd4, b: Simd4) -> Simd4 {
            Simd4(unsafe { _mm_add_ps(self.0, _mm_mul_ps(a.0, b.0)) })
        }

        #[inline]
        pub fn min(self, o: Simd4) -> Simd4 {
            Simd4(unsafe { _mm_min_ps(self.0, o.0) })
        }

        #[inline]
        pub fn max(self, o: Simd4) -> Simd4 {
            Simd4(unsafe { _mm_max_ps(self.0, o.0) })
        }
    }
}

#[cfg(target_arch = "aarch64")]
mod imp {
    use std::arch::aarch64::*;

    #[derive(Copy, Clone)]
    pub struct Simd4(float32x4_t);

    impl Simd4 {
        #[inline]
        pub fn splat(v: f32) -> Simd4 {
            Simd4(unsafe { vdupq_n_f32(v) })
        }

        #[inline]
        pub fn load(a: [f32; 4]) -> Simd4 {
            Simd4(unsafe { vld1q_f32(a.as_ptr()) })
        }

        #[inline]
        pub fn store(self) -> [f32; 4] {
            let mut out = [0.0f32; 4];
            unsafe { vst1q_f32(out.as_mut_ptr(), self.0) };
            out
        }

        #[inline]
        pub fn add(self, o: Simd4) -> Simd4 {
            Simd4(unsafe { vaddq_f32(self.0, o.0) })
        }

        #[inline]
        pub fn mul(self, o: Simd4) -> Simd4 {
            Simd4(unsafe { vmulq_f32(self.0, o.0) })
        }

        /// `self + a * b`, fused.
        #[inline]
        pub fn madd(self, a: Simd4, b: Simd4) -> Simd4 {
            Simd4(unsafe { vfmaq_f32(self.0, a.0, b.0) })
        }

        #[inline]
        pub fn min(self, o: Simd4) -> Simd4 {
            Simd4(unsafe { vminq_f32(self.0, o.0) })
        }

        #[inline]
        pub fn max(self, o: Simd4) -> Simd4 {
            Simd4(unsafe { vmaxq_f32(self.0, o.0) })
        }
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod imp {
    #[derive(Copy, Clone)]
    pub struct Simd4([f32; 4]);

    impl Simd4 {
        #[inline]
        pub fn splat(v: f32) -> Simd4 {
            Simd4([v; 4])
        }

        #[inline]
        pub fn load(a: [f32; 4]) -> Simd4 {
            Simd4(a)
        }

        #[inline]
        pub fn store(self) -> [f32; 4] {
            self.0
        }

        #[inline]
        pub fn add(self, o: Simd4) -> Simd4 {
            let a = self.0;
            let b = o.0;
            Simd4([a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]])
        }

        #[inline]
        pub fn mul(self, o: Simd4) -> Simd4 {
            let a = self.0;
            let b = o.0;
            Simd4([a[0] * b[0], a[1] * b[1], a[2] * b[2], a[3] * b[3]])
        }

        #[inline]
        pub fn madd(self, a: Simd4, b: Simd4) -> Simd4 {
            self.add(a.mul(b))
        }

        #[inline]
        pub fn min(self, o: Simd4) -> Simd4 {
            let a = self.0;
            let b = o.0;
            Simd4([
                a[0].min(b[0]),
                a[1].min(b[1]),
                a[2].min(b[2]),
                a[3].min(b[3]),
            ])
        }

        #[inline]
        pub fn max(self, o: Simd4) -> Simd4 {
            let a = self.0;
            let b = o.0;
            Simd4([
                a[0].max(b[0]),
                a[1].max(b[1]),
                a[2].max(b[2]),
                a[3].max(b[3]),
            ])
        }
    }
}

pub use self::imp::Simd4;

impl Simd4 {
    #[inline]
    pub fn from_vec4(v: Vec4) -> Simd4 {
        Simd4::load(v.to_array())
    }

    #[inline]
    pub fn to_vec4(self) -> Vec4 {
        Vec4::from_array(self.store())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn madd_chain_matches_scalar() {
        let a = Simd4::load([1.0, 2.0, 3.0, 4.0]);
        let b = Simd4::load([0.5, 0.25, -1.0, 2.0]);
        let c = Simd4::splat(3.0);
        let r = a.madd(b, c).store();
        assert_eq!(r, [2.5, 2.75, 0.0, 10.0]);
    }

    #[test]
    fn min_max() {
        let a = Simd4::load([1.0, -2.0, 3.0, 0.0]);
        let b = Simd4::splat(0.5);
        assert_eq!(a.min(b).store(), [0.5, -2.0, 0.5, 0.0]);
        assert_eq!(a.max(b).store(), [1.0, 0.5, 3.0, 0.5]);
    }

    #[test]
    fn vec4_round_trip() {
        let v = Vec4::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(Simd4::from_vec4(v).to_vec4(), v);
    }
}
