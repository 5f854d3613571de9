//! Value types of the tree language.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    I32,
    U32,
    F32,
}

impl ScalarType {
    pub fn is_integer(&self) -> bool {
        matches!(self, ScalarType::I32 | ScalarType::U32)
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ScalarType::Bool)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::I32 => "i32",
            ScalarType::U32 => "u32",
            ScalarType::F32 => "f32",
        }
    }
}

/// A value type: scalar, vector of scalars, or f32 matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Scalar(ScalarType),
    Vector { width: u8, elem: ScalarType },
    Matrix { columns: u8, rows: u8 },
}

impl Type {
    pub const BOOL: Type = Type::Scalar(ScalarType::Bool);
    pub const I32: Type = Type::Scalar(ScalarType::I32);
    pub const U32: Type = Type::Scalar(ScalarType::U32);
    pub const F32: Type = Type::Scalar(ScalarType::F32);

    pub fn vec(width: u8, elem: ScalarType) -> Self {
        Type::Vector { width, elem }
    }

    pub fn mat(columns: u8, rows: u8) -> Self {
        Type::Matrix { columns, rows }
    }

    /// Element type of a scalar or vector; `None` for matrices
    pub fn scalar_elem(&self) -> Option<ScalarType> {
        match self {
            Type::Scalar(s) => Some(*s),
            Type::Vector { elem, .. } => Some(*elem),
            Type::Matrix { .. } => None,
        }
    }

    /// Number of scalar components (1 for scalars)
    pub fn width(&self) -> u8 {
        match self {
            Type::Scalar(_) => 1,
            Type::Vector { width, .. } => *width,
            Type::Matrix { columns, rows } => columns * rows,
        }
    }

    /// Same shape with a different element type (matrices are returned unchanged)
    pub fn with_elem(&self, elem: ScalarType) -> Type {
        match self {
            Type::Scalar(_) => Type::Scalar(elem),
            Type::Vector { width, .. } => Type::Vector {
                width: *width,
                elem,
            },
            Type::Matrix { .. } => *self,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Scalar(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Type::Vector { .. })
    }

    pub fn is_bool_scalar(&self) -> bool {
        *self == Type::BOOL
    }

    pub fn is_bool_scalar_or_vector(&self) -> bool {
        self.scalar_elem() == Some(ScalarType::Bool)
    }

    pub fn is_integer_scalar(&self) -> bool {
        matches!(self, Type::Scalar(s) if s.is_integer())
    }

    pub fn is_integer_scalar_or_vector(&self) -> bool {
        self.scalar_elem().map_or(false, |s| s.is_integer())
    }

    pub fn is_signed_integer_scalar_or_vector(&self) -> bool {
        self.scalar_elem() == Some(ScalarType::I32)
    }

    pub fn is_unsigned_integer_scalar(&self) -> bool {
        *self == Type::U32
    }

    pub fn is_unsigned_integer_vector(&self) -> bool {
        matches!(self, Type::Vector { elem: ScalarType::U32, .. })
    }

    pub fn is_unsigned_integer_scalar_or_vector(&self) -> bool {
        self.scalar_elem() == Some(ScalarType::U32)
    }

    pub fn is_float_scalar_or_vector(&self) -> bool {
        self.scalar_elem() == Some(ScalarType::F32)
    }

    pub fn is_numeric_scalar_or_vector(&self) -> bool {
        self.scalar_elem().map_or(false, |s| s.is_numeric())
    }

    pub fn is_float_matrix(&self) -> bool {
        matches!(self, Type::Matrix { .. })
    }

    pub fn is_square_float_matrix(&self) -> bool {
        matches!(self, Type::Matrix { columns, rows } if columns == rows)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(s) => write!(f, "{}", s.name()),
            Type::Vector { width, elem } => write!(f, "vec{}<{}>", width, elem.name()),
            Type::Matrix { columns, rows } => write!(f, "mat{}x{}<f32>", columns, rows),
        }
    }
}
