//! Potential sources
//!
//! A source produces a potential value for any world point. The engine
//! evaluates it once over the grid when it is installed, and again at
//! arbitrary points for the classical particle's smooth force lookup.

use glam::DVec2;

use crate::error::EquationError;
use crate::geometry::GridGeometry;

/// Outcome of a successful source check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCheck {
    /// Every grid value lies within `±max_potential`.
    Clean,
    /// Some values exceed `±max_potential` and will be clipped.
    Clipped,
}

/// Anything that can fill the potential grid.
pub trait PotentialSource: Send + Sync {
    /// Potential at a world point. May return NaN.
    fn evaluate(&self, x: f64, y: f64) -> f64;

    /// Validate the source against a grid before it is installed.
    fn check_errors(&self, geometry: &GridGeometry) -> Result<SourceCheck, EquationError> {
        scan_grid(self, geometry)
    }

    /// Short human-readable label for logs.
    fn label(&self) -> String {
        String::from("custom")
    }
}

/// Evaluate a source over every grid point, rejecting NaN and flagging
/// values beyond `±max_potential`.
pub fn scan_grid<S: PotentialSource + ?Sized>(
    source: &S,
    geometry: &GridGeometry,
) -> Result<SourceCheck, EquationError> {
    let max = geometry.max_potential();
    let n = geometry.samples_per_side();
    let mut clipped = false;

    for i in 0..n {
        let x = geometry.index_to_world(i);
        for j in 0..n {
            let value = source.evaluate(x, geometry.index_to_world(j));
            if value.is_nan() {
                return Err(EquationError::Undefined);
            }
            if value.abs() > max {
                clipped = true;
            }
        }
    }

    Ok(if clipped {
        SourceCheck::Clipped
    } else {
        SourceCheck::Clean
    })
}

/// Constant potential.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flat(pub f64);

impl PotentialSource for Flat {
    fn evaluate(&self, _x: f64, _y: f64) -> f64 {
        self.0
    }

    fn label(&self) -> String {
        format!("{}", self.0)
    }
}

impl Default for Flat {
    fn default() -> Self {
        Self(0.0)
    }
}

/// Functions the expression front end refuses to evaluate.
pub const FORBIDDEN_FUNCTIONS: [&str; 2] = ["acos", "asin"];

/// Adapter for a closure compiled by a host-side expression evaluator.
///
/// `expression` is the text the closure was built from; it is checked for
/// emptiness and forbidden functions before the grid scan.
pub struct FnSource<F> {
    expression: String,
    function: F,
}

impl<F> FnSource<F>
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    pub fn new(expression: impl Into<String>, function: F) -> Self {
        Self {
            expression: expression.into(),
            function,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl<F> PotentialSource for FnSource<F>
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    fn evaluate(&self, x: f64, y: f64) -> f64 {
        (self.function)(x, y)
    }

    fn check_errors(&self, geometry: &GridGeometry) -> Result<SourceCheck, EquationError> {
        let text = self.expression.trim();
        if text.is_empty() {
            return Err(EquationError::Empty);
        }
        if let Some(name) = FORBIDDEN_FUNCTIONS.iter().find(|f| text.contains(*f)) {
            return Err(EquationError::Forbidden {
                name: (*name).to_string(),
            });
        }
        if text.chars().filter(|&c| c == '(').count() != text.chars().filter(|&c| c == ')').count()
        {
            return Err(EquationError::BracketMismatch);
        }
        scan_grid(self, geometry)
    }

    fn label(&self) -> String {
        self.expression.clone()
    }
}

/// Built-in potential shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Barrier {
    /// Axis-aligned box of constant height
    Rectangular {
        height: f64,
        center: DVec2,
        half_extent: DVec2,
    },
    /// Radially symmetric hill or well
    Gaussian {
        height: f64,
        center: DVec2,
        sigma: f64,
    },
    /// Strip `x ∈ [x_min, x_max]` spanning every y
    Wall { height: f64, x_min: f64, x_max: f64 },
    /// Constant height for `x > position`
    Step { height: f64, position: f64 },
}

impl PotentialSource for Barrier {
    fn evaluate(&self, x: f64, y: f64) -> f64 {
        match *self {
            Barrier::Rectangular {
                height,
                center,
                half_extent,
            } => {
                let d = (DVec2::new(x, y) - center).abs();
                if d.x <= half_extent.x && d.y <= half_extent.y {
                    height
                } else {
                    0.0
                }
            }
            Barrier::Gaussian {
                height,
                center,
                sigma,
            } => {
                let r2 = DVec2::new(x, y).distance_squared(center);
                height * (-r2 / (2.0 * sigma * sigma)).exp()
            }
            Barrier::Wall {
                height,
                x_min,
                x_max,
            } => {
                if x >= x_min && x <= x_max {
                    height
                } else {
                    0.0
                }
            }
            Barrier::Step { height, position } => {
                if x > position {
                    height
                } else {
                    0.0
                }
            }
        }
    }

    fn label(&self) -> String {
        match self {
            Barrier::Rectangular { .. } => "rectangular barrier".into(),
            Barrier::Gaussian { .. } => "gaussian barrier".into(),
            Barrier::Wall { .. } => "wall".into(),
            Barrier::Step { .. } => "step".into(),
        }
    }
}
