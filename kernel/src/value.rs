//! Value Algebra — tagged, dimensionally-typed scalars with operator
//! semantics that reject cross-dimensional operations.
//!
//! Grounded on the teacher's `math/fixed.rs`: a private-payload newtype with
//! every fallible operation returning `Result<_, KernelError>` and no silent
//! coercion. Unlike the teacher's fixed-point `Fixed(u128)`, this spec calls
//! for IEEE-754 doubles (spec §4.1), so the payload here is `f64`/`String`/
//! `bool` rather than a scaled integer.

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// The dimensional discriminator of a `TaggedValue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Real,
    Count,
    Text,
    Bool,
    Symbol,
    Money,
    Mass,
    Distance,
    Temperature,
    Pressure,
    Volume,
    Time,
    Ratio,
    Error,
}

impl Dimension {
    /// Dimensionless dimensions may appear as either operand of `mul`/`div`
    /// against a dimensioned value.
    pub fn is_dimensionless(self) -> bool {
        matches!(self, Dimension::Real | Dimension::Count | Dimension::Ratio)
    }

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Real => "Real",
            Dimension::Count => "Count",
            Dimension::Text => "Text",
            Dimension::Bool => "Bool",
            Dimension::Symbol => "Symbol",
            Dimension::Money => "Money",
            Dimension::Mass => "Mass",
            Dimension::Distance => "Distance",
            Dimension::Temperature => "Temperature",
            Dimension::Pressure => "Pressure",
            Dimension::Volume => "Volume",
            Dimension::Time => "Time",
            Dimension::Ratio => "Ratio",
            Dimension::Error => "Error",
        }
    }

    /// Parse a `TypeName` token from Blueprint source into a `Dimension`.
    pub fn from_type_name(name: &str) -> Option<Dimension> {
        Some(match name {
            "Real" => Dimension::Real,
            "Count" => Dimension::Count,
            "Text" => Dimension::Text,
            "Bool" => Dimension::Bool,
            "Symbol" => Dimension::Symbol,
            "Money" => Dimension::Money,
            "Mass" => Dimension::Mass,
            "Distance" => Dimension::Distance,
            "Temperature" => Dimension::Temperature,
            "Pressure" => Dimension::Pressure,
            "Volume" => Dimension::Volume,
            "Time" => Dimension::Time,
            "Ratio" => Dimension::Ratio,
            "Error" => Dimension::Error,
            _ => return None,
        })
    }
}

/// The untagged payload carried by a `TaggedValue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Number(f64),
    Text(String),
    Bool(bool),
    Symbol(String),
}

/// An immutable, dimensionally-typed scalar.
///
/// Produced only by constructors and arithmetic — never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedValue {
    pub dimension: Dimension,
    /// Opaque unit tag (e.g. "usd", "kg"). `None` for unit-less dimensions
    /// (Text, Bool, Symbol, Ratio, Error, and untagged numerics).
    pub unit: Option<String>,
    pub payload: Payload,
}

impl TaggedValue {
    /// Construct a `TaggedValue`, rejecting non-finite numeric payloads.
    pub fn construct(dimension: Dimension, payload: Payload) -> Result<Self, KernelError> {
        if let Payload::Number(n) = payload {
            if !n.is_finite() {
                return Err(KernelError::Nan);
            }
        }
        if dimension == Dimension::Count {
            if let Payload::Number(n) = payload {
                if n.fract() != 0.0 {
                    return Err(KernelError::CountNotIntegral);
                }
            }
        }
        Ok(TaggedValue {
            dimension,
            unit: None,
            payload,
        })
    }

    /// Construct with an explicit unit tag.
    pub fn with_unit(dimension: Dimension, unit: impl Into<String>, payload: Payload) -> Result<Self, KernelError> {
        let mut v = Self::construct(dimension, payload)?;
        v.unit = Some(unit.into());
        Ok(v)
    }

    pub fn real(n: f64) -> Result<Self, KernelError> {
        Self::construct(Dimension::Real, Payload::Number(n))
    }

    pub fn count(n: i64) -> Result<Self, KernelError> {
        Self::construct(Dimension::Count, Payload::Number(n as f64))
    }

    pub fn money(n: f64) -> Result<Self, KernelError> {
        Self::construct(Dimension::Money, Payload::Number(n))
    }

    pub fn mass(n: f64) -> Result<Self, KernelError> {
        Self::construct(Dimension::Mass, Payload::Number(n))
    }

    pub fn text(s: impl Into<String>) -> Self {
        TaggedValue {
            dimension: Dimension::Text,
            unit: None,
            payload: Payload::Text(s.into()),
        }
    }

    pub fn boolean(b: bool) -> Self {
        TaggedValue {
            dimension: Dimension::Bool,
            unit: None,
            payload: Payload::Bool(b),
        }
    }

    pub fn symbol(s: impl Into<String>) -> Self {
        TaggedValue {
            dimension: Dimension::Symbol,
            unit: None,
            payload: Payload::Symbol(s.into()),
        }
    }

    /// Extract the numeric payload, failing for non-numeric dimensions.
    pub fn as_f64(&self) -> Result<f64, KernelError> {
        match self.payload {
            Payload::Number(n) => Ok(n),
            _ => Err(KernelError::DimensionMismatch),
        }
    }

    pub fn as_bool(&self) -> Result<bool, KernelError> {
        match self.payload {
            Payload::Bool(b) => Ok(b),
            _ => Err(KernelError::DimensionMismatch),
        }
    }

    pub fn as_symbol(&self) -> Result<&str, KernelError> {
        match &self.payload {
            Payload::Symbol(s) => Ok(s.as_str()),
            _ => Err(KernelError::DimensionMismatch),
        }
    }

    fn units_compatible(&self, other: &TaggedValue) -> bool {
        self.unit == other.unit
    }

    /// `a + b`: same dimension, compatible unit tags, returns in `a.dim`.
    pub fn add(&self, other: &TaggedValue) -> Result<TaggedValue, KernelError> {
        self.check_same_dim(other)?;
        let a = self.as_f64()?;
        let b = other.as_f64()?;
        TaggedValue::with_unit_opt(self.dimension, self.unit.clone(), a + b)
    }

    /// `a - b`: same dimension, compatible unit tags, returns in `a.dim`.
    pub fn sub(&self, other: &TaggedValue) -> Result<TaggedValue, KernelError> {
        self.check_same_dim(other)?;
        let a = self.as_f64()?;
        let b = other.as_f64()?;
        TaggedValue::with_unit_opt(self.dimension, self.unit.clone(), a - b)
    }

    fn check_same_dim(&self, other: &TaggedValue) -> Result<(), KernelError> {
        if self.dimension != other.dimension || !self.units_compatible(other) {
            Err(KernelError::DimensionMismatch)
        } else {
            Ok(())
        }
    }

    fn with_unit_opt(dimension: Dimension, unit: Option<String>, n: f64) -> Result<TaggedValue, KernelError> {
        let mut v = TaggedValue::construct(dimension, Payload::Number(n))?;
        v.unit = unit;
        Ok(v)
    }

    /// `mul(a, b)`: one operand must be dimensionless.
    pub fn mul(&self, other: &TaggedValue, epsilon: f64) -> Result<TaggedValue, KernelError> {
        let _ = epsilon;
        let a = self.as_f64()?;
        let b = other.as_f64()?;
        if self.dimension.is_dimensionless() && !other.dimension.is_dimensionless() {
            TaggedValue::with_unit_opt(other.dimension, other.unit.clone(), a * b)
        } else if other.dimension.is_dimensionless() && !self.dimension.is_dimensionless() {
            TaggedValue::with_unit_opt(self.dimension, self.unit.clone(), a * b)
        } else if self.dimension.is_dimensionless() && other.dimension.is_dimensionless() {
            TaggedValue::construct(Dimension::Real, Payload::Number(a * b))
        } else {
            Err(KernelError::DimensionMismatch)
        }
    }

    /// `div(a, b)`: one operand must be dimensionless, or both operands are
    /// the same dimension (yielding a dimensionless `Ratio`).
    pub fn div(&self, other: &TaggedValue, epsilon: f64) -> Result<TaggedValue, KernelError> {
        let a = self.as_f64()?;
        let b = other.as_f64()?;
        if b.abs() < epsilon {
            return Err(KernelError::DivisionByZero);
        }
        if self.dimension == other.dimension {
            return TaggedValue::construct(Dimension::Ratio, Payload::Number(a / b));
        }
        if other.dimension.is_dimensionless() {
            return TaggedValue::with_unit_opt(self.dimension, self.unit.clone(), a / b);
        }
        Err(KernelError::DimensionMismatch)
    }

    /// Comparisons additionally permit two *different* dimensionless
    /// dimensions against each other (`Real`/`Count`/`Ratio`) — a `ratio()`
    /// result is `Ratio`-dimensioned while a bare numeric threshold literal
    /// is `Real`-dimensioned, and `ratio(f, g) > 3.0` must still evaluate.
    fn check_comparable(&self, other: &TaggedValue) -> Result<(), KernelError> {
        if self.dimension.is_dimensionless() && other.dimension.is_dimensionless() {
            return Ok(());
        }
        self.check_same_dim(other)
    }

    fn cmp_values(&self, other: &TaggedValue) -> Result<std::cmp::Ordering, KernelError> {
        self.check_comparable(other)?;
        let a = self.as_f64()?;
        let b = other.as_f64()?;
        a.partial_cmp(&b).ok_or(KernelError::Nan)
    }

    pub fn lt(&self, other: &TaggedValue) -> Result<TaggedValue, KernelError> {
        Ok(TaggedValue::boolean(self.cmp_values(other)? == std::cmp::Ordering::Less))
    }

    pub fn le(&self, other: &TaggedValue) -> Result<TaggedValue, KernelError> {
        Ok(TaggedValue::boolean(self.cmp_values(other)? != std::cmp::Ordering::Greater))
    }

    pub fn gt(&self, other: &TaggedValue) -> Result<TaggedValue, KernelError> {
        Ok(TaggedValue::boolean(self.cmp_values(other)? == std::cmp::Ordering::Greater))
    }

    pub fn ge(&self, other: &TaggedValue) -> Result<TaggedValue, KernelError> {
        Ok(TaggedValue::boolean(self.cmp_values(other)? != std::cmp::Ordering::Less))
    }

    pub fn eq_value(&self, other: &TaggedValue) -> Result<TaggedValue, KernelError> {
        self.check_same_dim(other)?;
        Ok(TaggedValue::boolean(self.payload == other.payload))
    }

    /// `abs(a)`.
    pub fn abs(&self) -> Result<TaggedValue, KernelError> {
        let a = self.as_f64()?;
        TaggedValue::with_unit_opt(self.dimension, self.unit.clone(), a.abs())
    }

    /// `sqrt(a)`. Rejects negative inputs with `DimensionMismatch` (there is
    /// no real-valued result to return), surfacing as a runtime fault exactly
    /// like any other VM builtin failure.
    pub fn sqrt(&self) -> Result<TaggedValue, KernelError> {
        let a = self.as_f64()?;
        if a < 0.0 {
            return Err(KernelError::DimensionMismatch);
        }
        TaggedValue::construct(Dimension::Real, Payload::Number(a.sqrt()))
    }

    /// `as_real(a)`: reinterpret any numeric value as a dimensionless Real.
    pub fn as_real(&self) -> Result<TaggedValue, KernelError> {
        let a = self.as_f64()?;
        TaggedValue::construct(Dimension::Real, Payload::Number(a))
    }
}

/// `ratio(f, g)`: the unified f/g primitive (spec §4.1). Division by zero
/// under `epsilon` tolerance is reported as `DivisionByZero`, which the
/// verifier surfaces as an immediate `exec` finfr — matching the documented
/// boundary behavior "`ratio(f, 0)` returns finfr independent of `f`".
pub fn ratio(f: &TaggedValue, g: &TaggedValue, epsilon: f64) -> Result<TaggedValue, KernelError> {
    f.div(g, epsilon)
}
