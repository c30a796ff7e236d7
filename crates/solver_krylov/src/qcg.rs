//! Trust-region constrained conjugate gradients (QCG).
//!
//! Approximately minimises the model
//!
//! ```text
//! q(s) = bᵗs + ½ sᵗAs    subject to    ‖D s‖ ≤ Δ
//! ```
//!
//! by preconditioned CG on the scaled problem `D⁻ᵗ A D⁻¹`, where
//! `M = Dᵗ D` is applied through its symmetric halves. The iteration stops
//! on the boundary when it meets non-positive curvature or when an
//! unconstrained step would leave the region. The initial guess is ignored:
//! the step always starts at zero.

use std::any::Any;
use std::fmt;

use num_traits::Float;
use solver_core::{
    CapabilityError, ConvergedReason, KrylovOptions, PcSide, Preconditioner, SolverError, Vector,
    Viewer,
};
use tracing::debug;

use crate::solver::{KrylovContext, KrylovMethod, MethodOutcome};

/// Roots of `‖s + t·p‖ = Δ` from the precomputed inner products.
///
/// With `‖s‖ ≤ Δ` the roots satisfy `step1 ≥ 0 ≥ step2`. The branch on the
/// sign of `pᵗs` keeps the larger-magnitude root free of cancellation and
/// recovers the other one from the product of the roots.
///
/// # Example
///
/// ```
/// use solver_krylov::qcg::boundary_roots;
///
/// // s = 0, p = (1, 0), Δ = 2: t = ±2
/// let (step1, step2) = boundary_roots(1.0_f64, 0.0, 0.0, 2.0);
/// assert_eq!((step1, step2), (2.0, -2.0));
/// ```
pub fn boundary_roots<T: Float>(ptp: T, pts: T, sts: T, delta: T) -> (T, T) {
    let zero = T::zero();
    let dsq = delta * delta;
    let rad = (pts * pts - ptp * (sts - dsq)).max(zero).sqrt();
    if pts > zero {
        let step2 = -(pts + rad) / ptp;
        let step1 = (sts - dsq) / (ptp * step2);
        (step1, step2)
    } else {
        let step1 = -(pts - rad) / ptp;
        let step2 = if step1 == zero {
            zero
        } else {
            (sts - dsq) / (ptp * step1)
        };
        (step1, step2)
    }
}

/// Roots of `‖s + t·p‖ = Δ` for vectors `s` and `p`.
pub fn quadratic_roots<V: Vector>(s: &V, p: &V, delta: f64) -> (f64, f64) {
    boundary_roots(p.dot(p), p.dot(s), s.dot(s), delta)
}

/// QCG method state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Qcg {
    radius: Option<f64>,
    step_norm: Option<f64>,
    quadratic: Option<f64>,
}

impl Qcg {
    /// Registered name.
    pub const NAME: &'static str = "qcg";

    /// Method with the trust-region radius already set.
    pub fn with_radius(radius: f64) -> Self {
        Self {
            radius: Some(radius),
            ..Default::default()
        }
    }

    /// Set Δ (validated at setup).
    pub fn set_trust_region_radius(&mut self, radius: f64) {
        self.radius = Some(radius);
    }

    /// Current Δ.
    pub fn trust_region_radius(&self) -> Option<f64> {
        self.radius
    }

    /// Scaled norm `‖D s‖` of the last step.
    pub fn step_norm(&self) -> Option<f64> {
        self.step_norm
    }

    /// `bᵗx + ½xᵗAx` at the last (unscaled) step.
    pub fn quadratic_value(&self) -> Option<f64> {
        self.quadratic
    }

    fn radius_checked(&self) -> Result<f64, SolverError> {
        match self.radius {
            None => Err(SolverError::NotConfigured(
                "qcg trust-region radius has not been set".to_string(),
            )),
            Some(radius) if !(radius > 0.0) => Err(SolverError::InvalidParameter {
                name: "trust_region_radius",
                value: radius.to_string(),
                expected: "> 0",
            }),
            Some(radius) => Ok(radius),
        }
    }
}

impl<V: Vector> KrylovMethod<V> for Qcg {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_pc_side(&self) -> PcSide {
        PcSide::Symmetric
    }

    fn check_pc_side(&self, side: PcSide, pc: &dyn Preconditioner<V>) -> Result<(), SolverError> {
        if side != PcSide::Symmetric {
            return Err(SolverError::UnsupportedPcSide {
                method: Self::NAME,
                side: side.to_string(),
            });
        }
        if !pc.supports_symmetric() {
            return Err(CapabilityError::Unsupported {
                capability: "symmetric application",
                provider: pc.name().to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn work_vector_count(&self, _side: PcSide) -> usize {
        7
    }

    fn set_up(&mut self) -> Result<(), SolverError> {
        self.radius_checked().map(|_| ())
    }

    fn solve(&mut self, ctx: KrylovContext<'_, V>, b: &V, x: &mut V) -> Result<MethodOutcome, SolverError> {
        let KrylovContext {
            operator,
            preconditioner: pc,
            mut judge,
            work,
            ..
        } = ctx;
        let delta = self.radius_checked()?;
        self.step_norm = None;
        self.quadratic = None;
        let max_it = judge.max_iterations();
        let [p, asp, bs, w, wa, r, wtmp] = work.as_array_mut::<7>()?;

        x.set(0.0);
        w.set(0.0);
        pc.apply_symmetric_left(b, bs)?;
        let bsnrm = bs.norm2();
        let mut reason = judge.check(0, bsnrm);
        if !reason.is_iterating() {
            self.step_norm = Some(0.0);
            self.quadratic = Some(0.0);
            return Ok(MethodOutcome::new(0, reason, bsnrm));
        }

        r.copy_from(bs);
        r.scale(-1.0);
        p.copy_from(r);
        let mut rtr = r.dot(r);
        let mut rnrm = bsnrm;
        let mut step_norm = 0.0;
        let mut its = 0;
        let mut diagnostic = None;

        for i in 0..max_it {
            if rtr == 0.0 {
                debug!(iteration = i, "qcg: zero residual, no search direction");
                diagnostic = Some(format!("qcg: search direction vanished at iteration {}", i));
                x.copy_from(w);
                step_norm = w.norm2();
                reason = ConvergedReason::DivergedBreakdown;
                break;
            }
            its += 1;
            pc.apply_symmetric_right(p, wa)?;
            operator.apply(wa, wtmp)?;
            pc.apply_symmetric_left(wtmp, asp)?;
            let ptasp = p.dot(asp);

            if ptasp <= 0.0 {
                if i == 0 {
                    x.copy_from(p);
                    x.scale(delta / p.norm2());
                } else {
                    let (step1, step2) = quadratic_roots(w, p, delta);
                    let wtasp = w.dot(asp);
                    let bstp = bs.dot(p);
                    let model = |step: f64| step * (bstp + wtasp + 0.5 * step * ptasp);
                    let step = if model(step1) <= model(step2) { step1 } else { step2 };
                    x.waxpy(step, p, w);
                }
                debug!(iteration = i, ptasp, "qcg: non-positive curvature, stepping to boundary");
                step_norm = delta;
                reason = ConvergedReason::ConvergedNegativeCurvature;
                break;
            }

            let step = rtr / ptasp;
            x.waxpy(step, p, w);
            step_norm = x.norm2();
            if step_norm > delta {
                if i == 0 {
                    x.scale(delta / step_norm);
                } else {
                    let (step1, _) = quadratic_roots(w, p, delta);
                    x.waxpy(step1, p, w);
                }
                debug!(iteration = i, step_norm, delta, "qcg: constrained step");
                step_norm = delta;
                reason = ConvergedReason::ConvergedConstrainedStep;
                break;
            }

            w.copy_from(x);
            r.axpy(-step, asp);
            rnrm = r.norm2();
            reason = judge.check(i + 1, rnrm);
            if !reason.is_iterating() {
                break;
            }
            let rtr_new = r.dot(r);
            let beta = rtr_new / rtr;
            rtr = rtr_new;
            p.aypx(beta, r);
        }
        if reason.is_iterating() {
            reason = ConvergedReason::DivergedIterations;
        }

        pc.apply_symmetric_right(x, wa)?;
        x.copy_from(wa);
        operator.apply(x, wtmp)?;
        let quadratic = b.dot(x) + 0.5 * x.dot(wtmp);
        self.step_norm = Some(step_norm);
        self.quadratic = Some(quadratic);

        let mut outcome = MethodOutcome::new(its, reason, rnrm);
        outcome.diagnostic = diagnostic;
        Ok(outcome)
    }

    fn view(&self, viewer: &mut Viewer<'_>) -> fmt::Result {
        match self.radius {
            Some(radius) => viewer.line(format_args!("QCG: trust region radius={}", radius)),
            None => viewer.line(format_args!("QCG: trust region radius not set")),
        }
    }

    fn set_from_options(&mut self, options: &KrylovOptions) -> Result<(), SolverError> {
        if let Some(radius) = options.trust_region_radius {
            self.radius = Some(radius);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
