// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! Static types attached to declarations and inferred for expressions.
//!
//! The engine does not type-check anything itself. It asks a [`TypeOracle`]
//! for the type of an expression and for the two classifications it cares
//! about (arithmetic, subscriptable). [`StructuralOracle`] is the default
//! oracle; a host front-end can substitute its own.
//!
//! # Example
//! ```
//! use srcdiff::types::Type;
//! let arr = Type::array(Type::Double, Some(3));
//! assert!(arr.is_array());
//! assert_eq!(arr.element_type(), Some(&Type::Double));
//! ```

pub mod infer;

use std::fmt;

use crate::ast::{Arena, ExprId};

pub use infer::StructuralOracle;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Bool,
    Int,
    Float,
    Double,
    Array { elem: Box<Type>, len: Option<usize> },
    Pointer(Box<Type>),
    Reference(Box<Type>),
    /// Records and instantiated class templates, e.g. `srcdiff::tape<double>`.
    Named {
        scope: Vec<String>,
        name: String,
        args: Vec<Type>,
    },
    Function { ret: Box<Type>, params: Vec<Type> },
    /// Unconstrained template parameter of a library helper.
    Generic(String),
}

impl Type {
    pub fn array(elem: Type, len: Option<usize>) -> Self {
        Type::Array {
            elem: Box::new(elem),
            len,
        }
    }

    pub fn pointer(pointee: Type) -> Self {
        Type::Pointer(Box::new(pointee))
    }

    pub fn reference(self) -> Self {
        match self {
            Type::Reference(_) => self,
            other => Type::Reference(Box::new(other)),
        }
    }

    pub fn record(name: impl Into<String>) -> Self {
        Type::Named {
            scope: Vec::new(),
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>) -> Self {
        Type::Generic(name.into())
    }

    /// Strip one level of reference.
    pub fn non_reference(&self) -> &Type {
        match self {
            Type::Reference(inner) => inner,
            other => other,
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self.non_reference(),
            Type::Bool | Type::Int | Type::Float | Type::Double
        )
    }

    pub fn is_integral(&self) -> bool {
        matches!(self.non_reference(), Type::Bool | Type::Int)
    }

    pub fn is_floating(&self) -> bool {
        matches!(self.non_reference(), Type::Float | Type::Double)
    }

    /// Arithmetic and pointer types; everything else is an aggregate.
    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || matches!(self.non_reference(), Type::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.non_reference(), Type::Array { .. } | Type::Pointer(_))
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self.non_reference() {
            Type::Array { elem, .. } | Type::Pointer(elem) => Some(elem),
            _ => None,
        }
    }

    /// Element type after peeling every array/pointer level.
    pub fn innermost_element(&self) -> &Type {
        let mut ty = self.non_reference();
        while let Some(elem) = ty.element_type() {
            ty = elem.non_reference();
        }
        ty
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Array { elem, len } => match len {
                Some(n) => write!(f, "{elem}[{n}]"),
                None => write!(f, "{elem}[]"),
            },
            Type::Pointer(inner) => write!(f, "{inner} *"),
            Type::Reference(inner) => write!(f, "{inner} &"),
            Type::Named { scope, name, args } => {
                for part in scope {
                    write!(f, "{part}::")?;
                }
                write!(f, "{name}")?;
                if !args.is_empty() {
                    let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
                    write!(f, "<{}>", rendered.join(", "))?;
                }
                Ok(())
            }
            Type::Function { ret, params } => {
                let rendered: Vec<String> = params.iter().map(ToString::to_string).collect();
                write!(f, "{ret} (*)({})", rendered.join(", "))
            }
            Type::Generic(name) => write!(f, "{name}"),
        }
    }
}

/// Type service consumed by the builders.
pub trait TypeOracle {
    /// Static type of `expr`.
    fn type_of(&self, arena: &Arena, expr: ExprId) -> Type;

    fn is_arithmetic(&self, ty: &Type) -> bool {
        ty.is_arithmetic()
    }

    fn is_array(&self, ty: &Type) -> bool {
        ty.is_array()
    }

    /// Whether `expr` designates a modifiable object.
    fn is_modifiable_lvalue(&self, arena: &Arena, expr: ExprId) -> bool;
}

#[cfg(test)]
mod tests {
    use super::Type;

    #[test]
    fn arithmetic_classification_sees_through_references() {
        assert!(Type::Double.reference().is_arithmetic());
        assert!(Type::Bool.is_arithmetic());
        assert!(!Type::array(Type::Double, Some(2)).is_arithmetic());
        assert!(!Type::record("Functor").is_scalar());
        assert!(Type::pointer(Type::Int).is_scalar());
    }

    #[test]
    fn display_spells_template_instances() {
        let inner = Type::Named {
            scope: vec!["srcdiff".to_string()],
            name: "array_ref".to_string(),
            args: vec![Type::Double],
        };
        let tape = Type::Named {
            scope: vec!["srcdiff".to_string()],
            name: "tape".to_string(),
            args: vec![inner],
        };
        assert_eq!(tape.to_string(), "srcdiff::tape<srcdiff::array_ref<double>>");
    }

    #[test]
    fn innermost_element_of_nested_arrays() {
        let ty = Type::array(Type::array(Type::Float, Some(2)), Some(3));
        assert_eq!(ty.innermost_element(), &Type::Float);
    }
}
