use std::fmt;

/// A value to inject into a script assignment.
///
/// `Expr` carries raw right-hand-side text and is written verbatim, which is
/// how non-literal expressions such as tensor constructors are patched in.
/// The other variants render as canonical literals of the target scripting
/// language (the external framework's entry scripts are Python, so booleans
/// render as `True`/`False`).
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Expr(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expr(text) => f.write_str(text),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => {
                // Keep a decimal point so the literal stays float-typed.
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Self::Bool(v) => f.write_str(if *v { "True" } else { "False" }),
        }
    }
}

impl From<i64> for ScriptValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for ScriptValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ScriptValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ScriptValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ScriptValue {
    fn from(v: &str) -> Self {
        Self::Expr(v.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(v: String) -> Self {
        Self::Expr(v)
    }
}
